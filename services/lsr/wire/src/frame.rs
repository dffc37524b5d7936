//! Framing for the wire protocol.
//!
//! Each frame carries a one-byte type discriminator, the body length, a
//! CRC32 of the body, and the CBOR-encoded body itself.

use crate::error::WireError;
use crate::packet::{DataPacket, Packet};
use crate::topology::Advertisement;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;

/// Size of the fixed frame header (type + length + checksum)
pub const FRAME_HEADER_SIZE: usize = 1 + 4 + 4;

/// Maximum body size (1 MiB)
pub const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Frame types
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    /// Data packet
    Data = 1,
    /// Link-state advertisement
    Control = 2,
}

impl FrameType {
    /// Frame type for a packet
    pub fn of(packet: &Packet) -> Self {
        match packet {
            Packet::Data(_) => FrameType::Data,
            Packet::Control(_) => FrameType::Control,
        }
    }
}

impl TryFrom<u8> for FrameType {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(FrameType::Data),
            2 => Ok(FrameType::Control),
            other => Err(WireError::Type(other)),
        }
    }
}

/// Encode a packet into a single frame
pub fn encode(packet: &Packet) -> Result<Bytes, WireError> {
    let body = match packet {
        Packet::Data(data) => to_cbor(data)?,
        Packet::Control(adv) => to_cbor(adv)?,
    };
    if body.len() > MAX_BODY_SIZE {
        return Err(WireError::Size(body.len()));
    }

    let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + body.len());
    buf.put_u8(FrameType::of(packet) as u8);
    buf.put_u32(body.len() as u32);
    buf.put_u32(crc32fast::hash(&body));
    buf.put_slice(&body);

    Ok(buf.freeze())
}

/// Decode exactly one frame into a packet
pub fn decode(mut buf: &[u8]) -> Result<Packet, WireError> {
    if buf.len() < FRAME_HEADER_SIZE {
        return Err(WireError::Incomplete);
    }

    let frame_type = FrameType::try_from(buf.get_u8())?;
    let body_len = buf.get_u32() as usize;
    let checksum = buf.get_u32();

    if body_len > MAX_BODY_SIZE {
        return Err(WireError::Size(body_len));
    }
    if buf.len() < body_len {
        return Err(WireError::Incomplete);
    }
    if buf.len() > body_len {
        return Err(WireError::Trailing(buf.len() - body_len));
    }
    if crc32fast::hash(buf) != checksum {
        return Err(WireError::Checksum);
    }

    trace!(?frame_type, body_len, "decoding frame");
    match frame_type {
        FrameType::Data => from_cbor::<DataPacket>(buf).map(Packet::Data),
        FrameType::Control => from_cbor::<Advertisement>(buf).map(Packet::Control),
    }
}

fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, WireError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| WireError::Encode(e.to_string()))?;
    Ok(buf)
}

fn from_cbor<T: DeserializeOwned>(body: &[u8]) -> Result<T, WireError> {
    ciborium::from_reader(body).map_err(|e| WireError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{Adjacency, LinkChange, LinkRecord, NodeId};

    fn sample_advertisement(change: LinkChange) -> Advertisement {
        let mut adjacency = Adjacency::new();
        adjacency.insert(NodeId::from("B"), LinkRecord::new(1, 3));
        adjacency.insert(NodeId::from("c1"), LinkRecord::new(2, 1));
        Advertisement::new(NodeId::from("A"), 7, change, adjacency)
    }

    #[test]
    fn test_control_frame_keeps_change_kind() {
        for change in [
            LinkChange::Add(NodeId::from("B")),
            LinkChange::Remove(NodeId::from("B")),
            LinkChange::Refresh,
        ] {
            let packet = Packet::Control(sample_advertisement(change));
            let bytes = encode(&packet).unwrap();
            assert_eq!(bytes[0], FrameType::Control as u8);
            assert_eq!(decode(&bytes).unwrap(), packet);
        }
    }

    #[test]
    fn test_data_frame() {
        let mut data = DataPacket::new(NodeId::from("a"), NodeId::from("b"), Bytes::from_static(b"hi"));
        data.record_hop(&NodeId::from("A"));
        let packet = Packet::Data(data);

        let bytes = encode(&packet).unwrap();
        assert_eq!(bytes[0], FrameType::Data as u8);
        assert_eq!(decode(&bytes).unwrap(), packet);
    }

    #[test]
    fn test_corrupted_body() {
        let bytes = encode(&Packet::Control(sample_advertisement(LinkChange::Refresh))).unwrap();
        let mut corrupted = bytes.to_vec();
        let last = corrupted.len() - 1;
        corrupted[last] ^= 0xff;
        assert_eq!(decode(&corrupted), Err(WireError::Checksum));
    }

    #[test]
    fn test_malformed_frames() {
        assert_eq!(decode(&[2, 0, 0]), Err(WireError::Incomplete));

        let bytes = encode(&Packet::Control(sample_advertisement(LinkChange::Refresh))).unwrap();
        let mut unknown = bytes.to_vec();
        unknown[0] = 9;
        assert_eq!(decode(&unknown), Err(WireError::Type(9)));

        assert_eq!(decode(&bytes[..bytes.len() - 1]), Err(WireError::Incomplete));

        let mut trailing = bytes.to_vec();
        trailing.push(0);
        assert_eq!(decode(&trailing), Err(WireError::Trailing(1)));
    }

    fn control_frame(body: &serde_json::Value) -> Bytes {
        let mut cbor = Vec::new();
        ciborium::into_writer(body, &mut cbor).unwrap();

        let mut buf = BytesMut::new();
        buf.put_u8(FrameType::Control as u8);
        buf.put_u32(cbor.len() as u32);
        buf.put_u32(crc32fast::hash(&cbor));
        buf.put_slice(&cbor);
        buf.freeze()
    }

    #[test]
    fn test_negative_cost_fails_decode() {
        let advertisement = |cost: i64| {
            serde_json::json!({
                "origin": "A",
                "sequence": 1,
                "change": {"kind": "REFRESH"},
                "adjacency": {"B": {"port": 1, "cost": cost}}
            })
        };

        let Packet::Control(adv) = decode(&control_frame(&advertisement(3))).unwrap() else {
            panic!("expected an advertisement");
        };
        assert_eq!(adv.adjacency[&NodeId::from("B")], LinkRecord::new(1, 3));

        let rejected = decode(&control_frame(&advertisement(-3)));
        assert!(matches!(rejected, Err(WireError::Decode(_))), "{:?}", rejected);
    }

    #[test]
    fn test_type_mismatch_fails_decode() {
        // a data body framed as control must not decode as an advertisement
        let data = Packet::Data(DataPacket::new(NodeId::from("a"), NodeId::from("b"), Bytes::new()));
        let mut bytes = encode(&data).unwrap().to_vec();
        bytes[0] = FrameType::Control as u8;
        assert!(matches!(decode(&bytes), Err(WireError::Decode(_))));
    }
}
