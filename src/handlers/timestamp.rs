// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::{
    control_block::timestamp::{
        TIMESTAMP_PARAM_LEN, Timestamp, build_report_timestamp, build_set_timestamp,
        parse_timestamp, timestamp_param_list,
    },
    handlers::common::{HelperOpts, exec_in, exec_out, malformed},
    models::error::PtError,
    pt::session::PtTarget,
};

pub fn report_timestamp<T: PtTarget + ?Sized>(target: &T, opts: &HelperOpts) -> Result<Timestamp, PtError> {
    let data = exec_in(
        target,
        &build_report_timestamp(TIMESTAMP_PARAM_LEN as u32),
        TIMESTAMP_PARAM_LEN,
        opts,
    )?;
    malformed(parse_timestamp(&data))
}

/// SET TIMESTAMP to `millis` since the epoch; `None` uses the host clock.
pub fn set_timestamp<T: PtTarget + ?Sized>(
    target: &T,
    millis: Option<u64>,
    opts: &HelperOpts,
) -> Result<(), PtError> {
    let millis = match millis {
        Some(m) => m,
        None => u64::try_from(chrono::Utc::now().timestamp_millis())
            .map_err(|_| PtError::syntax("host clock before the epoch"))?,
    };
    exec_out(target, &build_set_timestamp(), Some(&timestamp_param_list(millis)), opts)
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;
    use crate::{control_block::timestamp::TimestampOrigin, handlers::common::mock::*};

    fn opts() -> HelperOpts {
        HelperOpts {
            timeout_secs: 5,
            verbose: 0,
            strict: false,
        }
    }

    #[test]
    fn report_then_set() {
        let t = MockTarget::with(vec![
            good(&hex!("00 0a 02 00 01 8b cf e5 68 00 00 00")),
            good(&[]),
        ]);
        let ts = report_timestamp(&t, &opts()).expect("report");
        assert_eq!(ts.origin, TimestampOrigin::SetTimestamp);
        assert_eq!(ts.millis, 0x018b_cfe5_6800);
        set_timestamp(&t, Some(1000), &opts()).expect("set");
        assert_eq!(t.cdbs()[1][..2], hex!("a4 0f"));
        assert_eq!(t.data_out()[0], hex!("00 0a 00 00 00 00 00 00 03 e8 00 00").to_vec());
    }
}
