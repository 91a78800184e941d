use crate::encoder::Encoder;
use crate::error::{Error, Result};
use crate::payloads::PayloadType;
use crate::WarningFlags;

use sawp_flags::{BitFlags, Flag, Flags};

use nom::number::streaming::{be_u32, be_u64, be_u8};
use nom::sequence::tuple;

use num_enum::{FromPrimitive, IntoPrimitive};

/// Length of an IKE header
pub const HEADER_LEN: u32 = 28;

/// Byte offset of the total-length field inside the header
pub const LENGTH_OFFSET: usize = 24;

pub const IKE_MAJOR_VERSION: u8 = 2;
pub const IKE_MINOR_VERSION: u8 = 0;

#[derive(Debug, FromPrimitive, IntoPrimitive, PartialEq, Eq, Copy, Clone)]
#[repr(u8)]
pub enum ExchangeType {
    /// Uninitialized sentinel, not an official exchange
    NotSet = 0,
    IkeSaInit = 34,
    IkeAuth = 35,
    CreateChildSa = 36,
    Informational = 37,
    #[num_enum(default)]
    Unknown = 255,
}

/// Flag bits of the header flags byte, numbered per RFC 7296.
///
/// All other bits are reserved: zero on generation, ignored on parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BitFlags)]
#[repr(u8)]
pub enum IkeFlags {
    /// Message is a response to a request with the same message id
    RESPONSE = 0b0000_1000,
    /// Sender can speak a higher major version
    VERSION = 0b0001_0000,
    /// Sender is the original initiator of the IKE_SA
    INITIATOR = 0b0010_0000,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Header {
    pub initiator_spi: u64,
    pub responder_spi: u64,
    pub raw_next_payload: u8,
    pub next_payload: PayloadType,
    pub major_version: u8,
    pub minor_version: u8,
    pub exchange_type: ExchangeType,
    pub flags: Flags<IkeFlags>,
    pub message_id: u32,
    pub length: u32,
}

impl Header {
    pub const MAJOR_VERSION_MASK: u8 = 0xF0;
    pub const MINOR_VERSION_MASK: u8 = 0x0F;
    pub const FLAGS_MASK: u8 = 0b0011_1000;

    /// Header for an outbound message. The chain link and total length are
    /// filled in by [`crate::Message`] at generation time.
    pub fn new(
        initiator_spi: u64,
        responder_spi: u64,
        exchange_type: ExchangeType,
        flags: Flags<IkeFlags>,
        message_id: u32,
    ) -> Self {
        Self {
            initiator_spi,
            responder_spi,
            raw_next_payload: 0,
            next_payload: PayloadType::NoNextPayload,
            major_version: IKE_MAJOR_VERSION,
            minor_version: IKE_MINOR_VERSION,
            exchange_type,
            flags,
            message_id,
            length: HEADER_LEN,
        }
    }

    // IKEv2 Header - RFC7296
    //                      1                   2                   3
    //  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
    // +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    // |                       IKE SA Initiator's SPI                  |
    // |                                                               |
    // +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    // |                       IKE SA Responder's SPI                  |
    // |                                                               |
    // +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    // |  Next Payload | MjVer | MnVer | Exchange Type |     Flags     |
    // +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    // |                          Message ID                           |
    // +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    // |                            Length                             |
    // +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    pub fn parse(input: &[u8]) -> Result<(&[u8], (Self, Flags<WarningFlags>))> {
        let mut warnings = WarningFlags::none();

        let (input, (initiator_spi, responder_spi, raw_next_payload, version)) =
            tuple((be_u64, be_u64, be_u8, be_u8))(input)?;
        let (major_version, minor_version) = Self::split_version(version);
        // Which versions are acceptable is a state-machine decision; only a
        // higher major is flagged since it affects version negotiation.
        if major_version > IKE_MAJOR_VERSION {
            warnings |= WarningFlags::HigherMajorVersion;
        }

        let next_payload = PayloadType::from(raw_next_payload);
        if next_payload == PayloadType::Unknown {
            warnings |= WarningFlags::UnknownPayload;
        }

        let (input, (raw_exchange_type, flag_bits, message_id, length)) =
            tuple((be_u8, be_u8, be_u32, be_u32))(input)?;
        let exchange_type = ExchangeType::from(raw_exchange_type);
        if exchange_type == ExchangeType::Unknown {
            return Err(Error::malformed("unrecognized exchange type"));
        }
        if flag_bits & !Self::FLAGS_MASK != 0 {
            warnings |= WarningFlags::NonZeroReserved;
        }
        let flags = Flags::<IkeFlags>::from_bits(flag_bits & Self::FLAGS_MASK);

        Ok((
            input,
            (
                Self {
                    initiator_spi,
                    responder_spi,
                    raw_next_payload,
                    next_payload,
                    major_version,
                    minor_version,
                    exchange_type,
                    flags,
                    message_id,
                    length,
                },
                warnings,
            ),
        ))
    }

    /// Append the 28-byte encoding to `enc`.
    ///
    /// The version byte always carries 2.0 and reserved flag bits are
    /// cleared, whatever the stored fields say. The length field is written
    /// as stored; [`crate::Message::to_bytes`] backpatches it once the total
    /// message size is known.
    pub fn generate(&self, enc: &mut Encoder) -> Result<()> {
        if self.exchange_type == ExchangeType::Unknown {
            return Err(Error::encoding("exchange type has no wire code"));
        }
        enc.put_u64(self.initiator_spi)?;
        enc.put_u64(self.responder_spi)?;
        enc.put_u8(self.next_code())?;
        enc.put_u8((IKE_MAJOR_VERSION << 4) | IKE_MINOR_VERSION)?;
        enc.put_u8(self.exchange_type.into())?;
        enc.put_u8(self.flags.bits() & Self::FLAGS_MASK)?;
        enc.put_u32(self.message_id)?;
        enc.put_u32(self.length)?;
        Ok(())
    }

    pub fn encoded_len(&self) -> usize {
        HEADER_LEN as usize
    }

    /// Wire code of the first payload in the chain.
    pub fn next_code(&self) -> u8 {
        match self.next_payload {
            PayloadType::Unknown => self.raw_next_payload,
            known => known.into(),
        }
    }

    pub fn set_next(&mut self, code: u8) {
        self.raw_next_payload = code;
        self.next_payload = PayloadType::from(code);
    }

    fn major_version(version: u8) -> u8 {
        (version & Self::MAJOR_VERSION_MASK)
            .checked_shr(4)
            .unwrap_or(0)
    }

    fn minor_version(version: u8) -> u8 {
        version & Self::MINOR_VERSION_MASK
    }

    fn split_version(version: u8) -> (u8, u8) {
        (Self::major_version(version), Self::minor_version(version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_nibbles() {
        assert_eq!(Header::split_version(0x20), (2, 0));
        assert_eq!(Header::split_version(0x2f), (2, 15));
        assert_eq!(Header::split_version(0x00), (0, 0));
    }

    #[test]
    fn generate_clears_reserved_flag_bits() {
        let mut header = Header::new(
            1,
            2,
            ExchangeType::Informational,
            IkeFlags::RESPONSE.into(),
            7,
        );
        header.flags = Flags::from_bits(0xFF);
        let mut enc = Encoder::new();
        header.generate(&mut enc).unwrap();
        assert_eq!(enc.into_bytes()[19], Header::FLAGS_MASK);
    }
}
