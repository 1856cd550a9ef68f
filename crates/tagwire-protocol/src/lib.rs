pub mod codec;
pub mod frame;
pub mod message;

pub use codec::FrameCodec;
pub use frame::FrameHeader;
pub use message::{
    KeepaliveSpec, KeepaliveTrigger, Message, MessageBody, MessageType, ReaderConfig,
    TagReportEntry,
};
