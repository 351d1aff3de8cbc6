use std::num::NonZeroU32;

use hawser_packet::Packet;

/// The classes of `SSH-CONNECT` packets tasks can subscribe to.
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub enum Interest {
    GlobalRequest,
    GlobalResponse,

    ChannelOpenRequest,
    ChannelOpenResponse(u32),

    ChannelWindowAdjust(u32),
    ChannelData(u32, Option<NonZeroU32>),
    ChannelEof(u32),
    ChannelClose(u32),

    ChannelRequest(u32),
    ChannelResponse(u32),
}

impl Interest {
    /// Classify a packet by message number and recipient channel,
    /// without fully deserializing it.
    pub fn parse(packet: &Packet) -> Option<Self> {
        let msg = *packet.payload.first()?;

        let channel = || {
            packet
                .payload
                .get(1..5)
                .and_then(|bytes| bytes.try_into().ok())
                .map(u32::from_be_bytes)
        };
        let data_type = || {
            packet
                .payload
                .get(5..9)
                .and_then(|bytes| bytes.try_into().ok())
                .and_then(|bytes| NonZeroU32::new(u32::from_be_bytes(bytes)))
        };

        match msg {
            80 => Some(Self::GlobalRequest),
            81 | 82 => Some(Self::GlobalResponse),
            90 => Some(Self::ChannelOpenRequest),
            91 | 92 => channel().map(Self::ChannelOpenResponse),
            93 => channel().map(Self::ChannelWindowAdjust),
            94 => channel().map(|id| Self::ChannelData(id, None)),
            95 => channel().map(|id| Self::ChannelData(id, data_type())),
            96 => channel().map(Self::ChannelEof),
            97 => channel().map(Self::ChannelClose),
            98 => channel().map(Self::ChannelRequest),
            99 | 100 => channel().map(Self::ChannelResponse),
            _ => None,
        }
    }
}
