use bytes::{Buf, BufMut, BytesMut};

/// Fixed payload size of a protocol unit. Every application message occupies exactly one
///  unit, there is no fragmentation or coalescing.
pub const PAYLOAD_LEN: usize = 20;

/// Sentinel for the `seqnum` / `acknum` fields when they carry no information: pure acks
///  have no sequence number of their own, data units acknowledge nothing.
///
/// NB: The sentinel participates in the checksum like any other field value.
pub const NOT_IN_USE: i32 = -1;

pub type Payload = [u8; PAYLOAD_LEN];

/// A chunk of application data as submitted by the application layer.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct Message {
    pub data: Payload,
}

impl Message {
    pub fn new(data: Payload) -> Message {
        Message { data }
    }
}

/// The protocol unit exchanged between the two endpoints. A unit is immutable once built;
///  retransmissions send the stored unit unchanged rather than rebuilding it.
///
/// All fields are fixed-width and big-endian on the wire - both endpoints must agree on
///  this layout and on the checksum formula for interoperability.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct Packet {
    /// wire sequence number in `[0, seq_space)`, or [NOT_IN_USE] for pure acks
    pub seqnum: i32,
    /// acknowledged wire sequence number, or [NOT_IN_USE] for data units
    pub acknum: i32,
    pub checksum: i32,
    pub payload: Payload,
}

impl Packet {
    pub const SERIALIZED_LEN: usize = 12 + PAYLOAD_LEN;

    pub fn data(seqnum: i32, payload: Payload) -> Packet {
        let mut result = Packet {
            seqnum,
            acknum: NOT_IN_USE,
            checksum: 0,
            payload,
        };
        result.checksum = result.compute_checksum();
        result
    }

    /// A pure acknowledgment unit: no sequence number of its own, zeroed payload.
    pub fn ack(acknum: i32) -> Packet {
        let mut result = Packet {
            seqnum: NOT_IN_USE,
            acknum,
            checksum: 0,
            payload: [0; PAYLOAD_LEN],
        };
        result.checksum = result.compute_checksum();
        result
    }

    /// Additive checksum over both header fields and the payload bytes. This is an
    ///  error-detection toy inherited from the protocol definition, not a CRC and not
    ///  security grade: compensating mutations across two fields cancel out.
    pub fn compute_checksum(&self) -> i32 {
        let mut sum = self.seqnum.wrapping_add(self.acknum);
        for &byte in &self.payload {
            sum = sum.wrapping_add(byte as i32);
        }
        sum
    }

    pub fn is_corrupted(&self) -> bool {
        self.checksum != self.compute_checksum()
    }

    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_i32(self.seqnum);
        buf.put_i32(self.acknum);
        buf.put_i32(self.checksum);
        buf.put_slice(&self.payload);
    }

    pub fn deser(buf: &mut impl Buf) -> anyhow::Result<Packet> {
        let seqnum = buf.try_get_i32()?;
        let acknum = buf.try_get_i32()?;
        let checksum = buf.try_get_i32()?;

        if buf.remaining() < PAYLOAD_LEN {
            anyhow::bail!(
                "packet truncated: {} payload bytes, expected {}",
                buf.remaining(),
                PAYLOAD_LEN
            );
        }
        let mut payload = [0u8; PAYLOAD_LEN];
        buf.copy_to_slice(&mut payload);

        Ok(Packet {
            seqnum,
            acknum,
            checksum,
            payload,
        })
    }
}
