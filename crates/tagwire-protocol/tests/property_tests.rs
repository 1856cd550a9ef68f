//! Property-based tests for framed protocol messages.
//!
//! Frames built from arbitrary tag reports and reader configurations must
//! decode to the same message, and the declared length must always match
//! the number of bytes produced.

use bytes::BytesMut;
use proptest::prelude::*;
use tagwire_protocol::{
    FrameCodec, FrameHeader, KeepaliveSpec, KeepaliveTrigger, Message, ReaderConfig,
    TagReportEntry,
};
use tokio_util::codec::Decoder;

fn tag_entry() -> impl Strategy<Value = TagReportEntry> {
    (
        prop::collection::vec(any::<u8>(), 0..32),
        any::<u16>(),
        any::<u64>(),
        prop::option::of(prop::collection::vec(any::<u8>(), 1..16)),
    )
        .prop_map(|(epc, antenna_id, timestamp_ms, tid)| TagReportEntry {
            epc,
            antenna_id,
            timestamp_ms,
            tid,
        })
}

fn reader_config() -> impl Strategy<Value = ReaderConfig> {
    (
        any::<bool>(),
        prop::option::of((
            prop_oneof![Just(KeepaliveTrigger::Null), Just(KeepaliveTrigger::Periodic)],
            any::<u32>(),
        )),
    )
        .prop_map(|(reset, keepalive)| ReaderConfig {
            reset_to_factory_default: reset,
            keepalive: keepalive.map(|(trigger, period_ms)| KeepaliveSpec { trigger, period_ms }),
        })
}

proptest! {
    #[test]
    fn prop_tag_report_survives_wire(
        id in any::<u32>(),
        entries in prop::collection::vec(tag_entry(), 0..20),
    ) {
        let msg = Message::tag_report(entries).with_id(id);
        let wire = msg.to_bytes().unwrap();

        prop_assert_eq!(wire.len(), msg.encoded_len());
        let header = FrameHeader::parse(&wire).unwrap();
        prop_assert_eq!(header.length as usize, wire.len());
        prop_assert_eq!(header.message_id, id);
        prop_assert_eq!(Message::decode(&wire).unwrap(), msg);
    }

    #[test]
    fn prop_reader_config_survives_wire(id in any::<u32>(), config in reader_config()) {
        let msg = Message::set_reader_config(config).with_id(id);
        prop_assert_eq!(Message::decode(&msg.to_bytes().unwrap()).unwrap(), msg);
    }

    #[test]
    fn prop_codec_splits_concatenated_frames(ids in prop::collection::vec(any::<u32>(), 1..30)) {
        let mut buffer = BytesMut::new();
        for id in &ids {
            buffer.extend_from_slice(&Message::keepalive().with_id(*id).to_bytes().unwrap());
        }

        let mut codec = FrameCodec::new();
        for id in &ids {
            let frame = codec.decode(&mut buffer).unwrap().unwrap();
            prop_assert_eq!(Message::decode(&frame).unwrap().id, *id);
        }
        prop_assert!(buffer.is_empty());
    }

    #[test]
    fn prop_truncated_frames_never_decode(
        entries in prop::collection::vec(tag_entry(), 1..5),
        cut in 1usize..10,
    ) {
        let wire = Message::tag_report(entries).to_bytes().unwrap();
        let cut = cut.min(wire.len() - 1);
        prop_assert!(Message::decode(&wire[..wire.len() - cut]).is_err());
    }
}
