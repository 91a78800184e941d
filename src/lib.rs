//! An IKEv2 (RFC 7296) message codec: wire-exact generation and parsing of
//! the fixed 28-byte IKE header and the chain of typed payloads that follows
//! it.
//!
//! The sending side builds a [`Message`] from a [`header::Header`] and an
//! ordered payload chain, links it and generates the wire bytes; the
//! receiving side hands a complete datagram to a [`Parser`] and gets the
//! decoded message back, or a precise [`error::Error`] if the peer sent
//! something the codec must reject. Input comes from an untrusted network
//! peer: a malformed message yields an error and nothing else, no partially
//! decoded state escapes.
//!
//! Non-fatal oddities (reserved bits set, unknown but skippable payload
//! codes, a higher major version than we speak) are reported as
//! [`WarningFlags`] on the parsed message so the caller can decide how much
//! to tolerate.
//!
//! The following references were used to create this crate:
//!
//! [IKE v2](https://www.rfc-editor.org/rfc/rfc7296.html)
//!
//! # Example
//! ```
//! use ike_codec::header::{ExchangeType, Header, IkeFlags};
//! use ike_codec::payloads::{Payload, PayloadData};
//! use ike_codec::{Message, Parser};
//!
//! let header = Header::new(
//!     0x1122334455667788,
//!     0,
//!     ExchangeType::IkeSaInit,
//!     IkeFlags::INITIATOR.into(),
//!     0,
//! );
//! let payloads = vec![Payload::new(PayloadData::Nonce(vec![0xaa; 16]))];
//! let mut message = Message::new(header, payloads);
//! message.link();
//!
//! let bytes = message.to_bytes().expect("valid message");
//!
//! let parsed = Parser::default().parse(&bytes).expect("round trip");
//! assert_eq!(parsed.header.exchange_type, ExchangeType::IkeSaInit);
//! assert_eq!(parsed.payloads, message.payloads);
//! ```

pub mod encoder;
pub mod error;
pub mod header;
pub mod payloads;

use encoder::Encoder;
use error::{Error, ErrorKind, Result};
use header::{Header, HEADER_LEN, LENGTH_OFFSET};
use payloads::{Payload, PayloadData, PayloadType};

use sawp_flags::{BitFlags, Flag, Flags};

type IResult<'a, O> = nom::IResult<&'a [u8], O, nom::error::Error<&'a [u8]>>;

/// Non-fatal anomalies observed while parsing.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, BitFlags)]
pub enum WarningFlags {
    /// Unknown payload type code
    UnknownPayload = 0b0000_0001,
    /// Non-zero reserved field
    NonZeroReserved = 0b0000_0010,
    /// Header announced a major version above 2
    HigherMajorVersion = 0b0000_0100,
}

impl WarningFlags {
    fn flatten(input: &[Flags<Self>]) -> Flags<Self> {
        input.iter().fold(Self::none(), |acc, w| acc | *w)
    }
}

/// A complete IKE message: header plus payload chain.
///
/// The chain exclusively owns its payloads; dropping the message releases
/// them.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Message {
    pub header: Header,
    pub payloads: Vec<Payload>,
    /// Anomalies observed while parsing; empty on built messages.
    pub warnings: Flags<WarningFlags>,
}

impl Message {
    pub fn new(header: Header, payloads: Vec<Payload>) -> Self {
        Self {
            header,
            payloads,
            warnings: WarningFlags::none(),
        }
    }

    /// Rewrite the header's and every payload's chain link from the actual
    /// payload sequence.
    ///
    /// Messages built by hand should call this before [`Message::to_bytes`];
    /// a chain linked here always passes generation-time validation.
    pub fn link(&mut self) {
        let first = self.payloads.first().map_or(0, Payload::type_code);
        self.header.set_next(first);

        let mut followers: Vec<u8> = self
            .payloads
            .iter()
            .skip(1)
            .map(Payload::type_code)
            .collect();
        followers.push(0);
        for (payload, code) in self.payloads.iter_mut().zip(followers) {
            payload.set_next(code);
        }
    }

    /// Total wire size: header plus every payload.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN as usize
            + self
                .payloads
                .iter()
                .map(Payload::encoded_len)
                .sum::<usize>()
    }

    /// Serialize to wire bytes.
    ///
    /// The chain is validated first and nothing is emitted when a link does
    /// not match the payload that follows it. The header's total-length
    /// field is backpatched once every payload has been generated.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.validate_chain()?;

        let total = self.encoded_len();
        let length = u32::try_from(total)
            .map_err(|_| Error::encoding("message exceeds 32-bit length field"))?;

        let mut enc = Encoder::with_capacity(total);
        self.header.generate(&mut enc)?;
        for payload in &self.payloads {
            payload.generate(&mut enc)?;
        }
        enc.patch_u32(LENGTH_OFFSET, length)?;
        Ok(enc.into_bytes())
    }

    fn validate_chain(&self) -> Result<()> {
        let first = self.payloads.first().map_or(0, Payload::type_code);
        if self.header.next_code() != first {
            return Err(Error::chain("header link does not match first payload"));
        }
        for pair in self.payloads.windows(2) {
            if pair[0].next_code() != pair[1].type_code() {
                return Err(Error::chain("link does not match following payload"));
            }
        }
        if let Some(last) = self.payloads.last() {
            if last.next_code() != 0 {
                return Err(Error::chain("last payload does not end the chain"));
            }
        }
        Ok(())
    }
}

/// Parser handle carrying the skip policies the surrounding daemon chose.
///
/// The codec itself is stateless: one handle may decode any number of
/// independent buffers, concurrently from different threads if desired.
#[derive(Debug, Default, Clone, Copy)]
pub struct Parser {
    /// Fail on any unknown payload code, even non-critical ones.
    pub reject_unknown_payloads: bool,
    /// Treat non-zero reserved bits as malformed instead of a warning.
    pub strict_reserved: bool,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one complete message from `input`.
    ///
    /// `input` must hold exactly one datagram: the header length field has
    /// to match the buffer size and no bytes may remain once the payload
    /// chain has been walked.
    pub fn parse(&self, input: &[u8]) -> Result<Message> {
        if input.len() < HEADER_LEN as usize {
            return Err(Error::truncated());
        }

        let (mut payload_input, (header, mut warnings)) = Header::parse(input)?;

        if header.length as usize != input.len() {
            return Err(Error::new(ErrorKind::LengthMismatch {
                declared: header.length,
                actual: u32::try_from(input.len()).unwrap_or(u32::MAX),
            }));
        }
        self.check_reserved(warnings)?;

        let mut payloads = Vec::new();
        let mut next_code = header.next_code();
        while next_code != 0 {
            // Payloads following an SK payload are inside its encrypted
            // blob; the walk cannot continue past it.
            let stop_after = next_code == u8::from(PayloadType::EncryptedAndAuthenticated);

            let (rest, (payload, payload_warnings)) = Payload::parse(payload_input, next_code)?;
            self.check_reserved(payload_warnings)?;
            warnings |= payload_warnings;

            if let PayloadData::Unknown { type_code, .. } = &payload.data {
                if self.reject_unknown_payloads || payload.critical {
                    return Err(Error::new(ErrorKind::UnsupportedPayload(*type_code)));
                }
            }

            payload_input = rest;
            next_code = payload.next_code();
            payloads.push(payload);

            if stop_after {
                break;
            }
        }

        if !payload_input.is_empty() {
            return Err(Error::new(ErrorKind::TrailingData(payload_input.len())));
        }

        Ok(Message {
            header,
            payloads,
            warnings,
        })
    }

    fn check_reserved(&self, warnings: Flags<WarningFlags>) -> Result<()> {
        if self.strict_reserved && warnings.contains(WarningFlags::NonZeroReserved) {
            return Err(Error::malformed("reserved bits set"));
        }
        Ok(())
    }
}
