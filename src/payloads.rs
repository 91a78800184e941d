use crate::encoder::Encoder;
use crate::error::{Error, Result};
use crate::{IResult, WarningFlags};

use sawp_flags::{Flag, Flags};

use nom::bytes::streaming::take;
use nom::combinator::{complete, map, rest};
use nom::multi::{count, many0, many1};
use nom::number::streaming::{be_u16, be_u24, be_u32, be_u8};
use nom::sequence::tuple;

use num_enum::{FromPrimitive, IntoPrimitive};

/// Size of the generic payload sub-header (next type, critical bit,
/// 16-bit length) that precedes every payload body.
pub const GENERIC_PAYLOAD_HEADER_LEN: u16 = 4;

const CRITICAL_BIT: u8 = 0b1000_0000;

/// IKEv2 payload type codes, RFC 7296 section 3.2.
#[derive(Debug, FromPrimitive, IntoPrimitive, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum PayloadType {
    NoNextPayload = 0,
    SecurityAssociation = 33,
    KeyExchange = 34,
    IdentificationInitiator = 35,
    IdentificationResponder = 36,
    Certificate = 37,
    CertificateRequest = 38,
    Authentication = 39,
    Nonce = 40,
    Notify = 41,
    Delete = 42,
    VendorId = 43,
    TrafficSelectorInitiator = 44,
    TrafficSelectorResponder = 45,
    EncryptedAndAuthenticated = 46,
    Configuration = 47,
    #[num_enum(default)]
    Unknown = 255,
}

/// One element of the payload chain: the generic sub-header fields plus the
/// typed body.
///
/// `raw_next_payload` carries the chain-link code byte exactly as seen or
/// generated; `next_payload` is its decoded form. [`crate::Message::link`]
/// keeps both in sync on the sending side.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Payload {
    pub raw_next_payload: u8,
    pub next_payload: PayloadType,
    pub critical: bool,
    pub data: PayloadData,
}

impl Payload {
    /// A payload with an empty chain link, to be linked by
    /// [`crate::Message::link`].
    pub fn new(data: PayloadData) -> Self {
        Self {
            raw_next_payload: 0,
            next_payload: PayloadType::NoNextPayload,
            critical: false,
            data,
        }
    }

    /// Wire code of this payload.
    pub fn type_code(&self) -> u8 {
        self.data.type_code()
    }

    /// Wire code of the next payload in the chain, 0 when last.
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

    /// Total encoded size including the 4-byte sub-header.
    pub fn encoded_len(&self) -> usize {
        GENERIC_PAYLOAD_HEADER_LEN as usize + self.data.body_len()
    }

    // Generic Payload - RFC7296
    //                       1                   2                   3
    //   0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
    //  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    //  | Next Payload  |C|  RESERVED   |         Payload Length        |
    //  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    //
    // All payloads begin with the generic sub-header so it is handled here
    // instead of at the start of each type specific parser.
    pub fn parse(input: &[u8], type_code: u8) -> Result<(&[u8], (Self, Flags<WarningFlags>))> {
        let mut warnings = WarningFlags::none();

        let (input, (raw_next_payload, critical_byte, payload_length)) =
            tuple((be_u8, be_u8, be_u16))(input)?;
        if critical_byte & !CRITICAL_BIT != 0 {
            warnings |= WarningFlags::NonZeroReserved;
        }
        let next_payload = PayloadType::from(raw_next_payload);
        if next_payload == PayloadType::Unknown {
            warnings |= WarningFlags::UnknownPayload;
        }
        if payload_length < GENERIC_PAYLOAD_HEADER_LEN {
            return Err(Error::malformed("payload length below sub-header size"));
        }

        let (input, body) = take(payload_length - GENERIC_PAYLOAD_HEADER_LEN)(input)?;
        let (_body, (data, body_warnings)) = PayloadData::parse(body, type_code)?;
        warnings |= body_warnings;

        Ok((
            input,
            (
                Self {
                    raw_next_payload,
                    next_payload,
                    critical: critical_byte & CRITICAL_BIT != 0,
                    data,
                },
                warnings,
            ),
        ))
    }

    /// Append the sub-header and body encoding to `enc`.
    pub fn generate(&self, enc: &mut Encoder) -> Result<()> {
        let total = GENERIC_PAYLOAD_HEADER_LEN as usize + self.data.body_len();
        let payload_length = u16::try_from(total)
            .map_err(|_| Error::encoding("payload body exceeds 16-bit length field"))?;
        enc.put_u8(self.next_code())?;
        enc.put_u8(if self.critical { CRITICAL_BIT } else { 0 })?;
        enc.put_u16(payload_length)?;
        self.data.generate(enc)
    }
}

/// Typed payload bodies.
///
/// Closed set: the chain walk dispatches exhaustively over this enum, and
/// codes without a typed body land in [`PayloadData::Unknown`] which keeps
/// the raw code and bytes so the payload regenerates byte-exactly.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum PayloadData {
    SecurityAssociation(Vec<Proposal>),
    KeyExchange {
        dh_group: u16,
        key_exchange_data: Vec<u8>,
    },
    IdentificationInitiator(Identification),
    IdentificationResponder(Identification),
    Certificate(Certificate),
    CertificateRequest(CertificateRequest),
    Authentication {
        auth_method: u8,
        authentication_data: Vec<u8>,
    },
    Nonce(Vec<u8>),
    Notify {
        protocol_id: u8,
        notify_message_type: u16,
        spi: Vec<u8>,
        notification_data: Vec<u8>,
    },
    Delete {
        protocol_id: u8,
        spi_size: u8,
        spis: Vec<Vec<u8>>,
    },
    VendorId(Vec<u8>),
    TrafficSelectorInitiator(Vec<TrafficSelector>),
    TrafficSelectorResponder(Vec<TrafficSelector>),
    /// Opaque: decryption happens in a peer component.
    EncryptedAndAuthenticated(Vec<u8>),
    Configuration {
        cfg_type: u8,
        attributes: Vec<Attribute>,
    },
    Unknown {
        type_code: u8,
        data: Vec<u8>,
    },
}

impl PayloadData {
    pub fn payload_type(&self) -> PayloadType {
        match self {
            Self::SecurityAssociation(_) => PayloadType::SecurityAssociation,
            Self::KeyExchange { .. } => PayloadType::KeyExchange,
            Self::IdentificationInitiator(_) => PayloadType::IdentificationInitiator,
            Self::IdentificationResponder(_) => PayloadType::IdentificationResponder,
            Self::Certificate(_) => PayloadType::Certificate,
            Self::CertificateRequest(_) => PayloadType::CertificateRequest,
            Self::Authentication { .. } => PayloadType::Authentication,
            Self::Nonce(_) => PayloadType::Nonce,
            Self::Notify { .. } => PayloadType::Notify,
            Self::Delete { .. } => PayloadType::Delete,
            Self::VendorId(_) => PayloadType::VendorId,
            Self::TrafficSelectorInitiator(_) => PayloadType::TrafficSelectorInitiator,
            Self::TrafficSelectorResponder(_) => PayloadType::TrafficSelectorResponder,
            Self::EncryptedAndAuthenticated(_) => PayloadType::EncryptedAndAuthenticated,
            Self::Configuration { .. } => PayloadType::Configuration,
            Self::Unknown { .. } => PayloadType::Unknown,
        }
    }

    /// Wire code, including the raw code of unknown payloads.
    pub fn type_code(&self) -> u8 {
        match self {
            Self::Unknown { type_code, .. } => *type_code,
            known => known.payload_type().into(),
        }
    }

    pub fn parse(input: &[u8], type_code: u8) -> IResult<(Self, Flags<WarningFlags>)> {
        match PayloadType::from(type_code) {
            PayloadType::SecurityAssociation => Self::parse_sa(input),
            PayloadType::KeyExchange => Self::parse_ke(input),
            PayloadType::IdentificationInitiator => map(Identification::parse, |(id, w)| {
                (Self::IdentificationInitiator(id), w)
            })(input),
            PayloadType::IdentificationResponder => map(Identification::parse, |(id, w)| {
                (Self::IdentificationResponder(id), w)
            })(input),
            PayloadType::Certificate => map(Certificate::parse, |(cert, w)| {
                (Self::Certificate(cert), w)
            })(input),
            PayloadType::CertificateRequest => map(CertificateRequest::parse, |(req, w)| {
                (Self::CertificateRequest(req), w)
            })(input),
            PayloadType::Authentication => Self::parse_authentication(input),
            PayloadType::Nonce => {
                Self::parse_raw(input).map(|(i, (data, w))| (i, (Self::Nonce(data), w)))
            }
            PayloadType::Notify => Self::parse_notify(input),
            PayloadType::Delete => Self::parse_delete(input),
            PayloadType::VendorId => {
                Self::parse_raw(input).map(|(i, (data, w))| (i, (Self::VendorId(data), w)))
            }
            PayloadType::TrafficSelectorInitiator => map(Self::parse_traffic_selectors, |(ts, w)| {
                (Self::TrafficSelectorInitiator(ts), w)
            })(input),
            PayloadType::TrafficSelectorResponder => map(Self::parse_traffic_selectors, |(ts, w)| {
                (Self::TrafficSelectorResponder(ts), w)
            })(input),
            PayloadType::EncryptedAndAuthenticated => Self::parse_raw(input)
                .map(|(i, (data, w))| (i, (Self::EncryptedAndAuthenticated(data), w))),
            PayloadType::Configuration => Self::parse_config(input),
            PayloadType::NoNextPayload | PayloadType::Unknown => {
                // Codes this catalogue has no typed body for are kept opaque.
                Self::parse_raw(input).map(|(i, (data, w))| {
                    (
                        i,
                        (
                            Self::Unknown { type_code, data },
                            w | WarningFlags::UnknownPayload,
                        ),
                    )
                })
            }
        }
    }

    /// Body size in bytes, excluding the generic sub-header.
    pub fn body_len(&self) -> usize {
        match self {
            Self::SecurityAssociation(proposals) => {
                proposals.iter().map(Proposal::encoded_len).sum()
            }
            Self::KeyExchange {
                key_exchange_data, ..
            } => 4 + key_exchange_data.len(),
            Self::IdentificationInitiator(id) | Self::IdentificationResponder(id) => {
                id.encoded_len()
            }
            Self::Certificate(cert) => cert.encoded_len(),
            Self::CertificateRequest(req) => req.encoded_len(),
            Self::Authentication {
                authentication_data,
                ..
            } => 4 + authentication_data.len(),
            Self::Nonce(data) | Self::VendorId(data) | Self::EncryptedAndAuthenticated(data) => {
                data.len()
            }
            Self::Notify {
                spi,
                notification_data,
                ..
            } => 4 + spi.len() + notification_data.len(),
            Self::Delete { spis, .. } => 4 + spis.iter().map(Vec::len).sum::<usize>(),
            Self::TrafficSelectorInitiator(selectors)
            | Self::TrafficSelectorResponder(selectors) => {
                4 + selectors.iter().map(TrafficSelector::encoded_len).sum::<usize>()
            }
            Self::Configuration { attributes, .. } => {
                4 + attributes.iter().map(Attribute::encoded_len).sum::<usize>()
            }
            Self::Unknown { data, .. } => data.len(),
        }
    }

    pub fn generate(&self, enc: &mut Encoder) -> Result<()> {
        match self {
            Self::SecurityAssociation(proposals) => {
                if proposals.is_empty() {
                    return Err(Error::encoding("security association without proposals"));
                }
                for (idx, proposal) in proposals.iter().enumerate() {
                    proposal.generate(enc, idx + 1 == proposals.len())?;
                }
                Ok(())
            }
            Self::KeyExchange {
                dh_group,
                key_exchange_data,
            } => {
                enc.put_u16(*dh_group)?;
                enc.put_u16(0)?;
                enc.put_slice(key_exchange_data)
            }
            Self::IdentificationInitiator(id) | Self::IdentificationResponder(id) => {
                id.generate(enc)
            }
            Self::Certificate(cert) => cert.generate(enc),
            Self::CertificateRequest(req) => req.generate(enc),
            Self::Authentication {
                auth_method,
                authentication_data,
            } => {
                enc.put_u8(*auth_method)?;
                enc.put_u24(0)?;
                enc.put_slice(authentication_data)
            }
            Self::Nonce(data) | Self::VendorId(data) | Self::EncryptedAndAuthenticated(data) => {
                enc.put_slice(data)
            }
            Self::Notify {
                protocol_id,
                notify_message_type,
                spi,
                notification_data,
            } => {
                let spi_size = u8::try_from(spi.len())
                    .map_err(|_| Error::encoding("notify SPI exceeds 8-bit size field"))?;
                enc.put_u8(*protocol_id)?;
                enc.put_u8(spi_size)?;
                enc.put_u16(*notify_message_type)?;
                enc.put_slice(spi)?;
                enc.put_slice(notification_data)
            }
            Self::Delete {
                protocol_id,
                spi_size,
                spis,
            } => {
                let num_spi = u16::try_from(spis.len())
                    .map_err(|_| Error::encoding("delete SPI count exceeds 16-bit field"))?;
                enc.put_u8(*protocol_id)?;
                enc.put_u8(*spi_size)?;
                enc.put_u16(num_spi)?;
                for spi in spis {
                    if spi.len() != *spi_size as usize {
                        return Err(Error::encoding("delete SPI does not match declared size"));
                    }
                    enc.put_slice(spi)?;
                }
                Ok(())
            }
            Self::TrafficSelectorInitiator(selectors)
            | Self::TrafficSelectorResponder(selectors) => {
                let number_ts = u8::try_from(selectors.len())
                    .map_err(|_| Error::encoding("selector count exceeds 8-bit field"))?;
                enc.put_u8(number_ts)?;
                enc.put_u24(0)?;
                for selector in selectors {
                    selector.generate(enc)?;
                }
                Ok(())
            }
            Self::Configuration {
                cfg_type,
                attributes,
            } => {
                enc.put_u8(*cfg_type)?;
                enc.put_u24(0)?;
                for attribute in attributes {
                    attribute.generate(enc)?;
                }
                Ok(())
            }
            Self::Unknown { data, .. } => enc.put_slice(data),
        }
    }

    // Security Association - RFC7296
    //                      1                   2                   3
    //  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
    // +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    // |                                                               |
    // ~                          <Proposals>                          ~
    // |                                                               |
    // +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    fn parse_sa(input: &[u8]) -> IResult<(Self, Flags<WarningFlags>)> {
        map(
            map(many1(complete(Proposal::parse)), |proposals| {
                let (proposals, warns): (Vec<_>, Vec<_>) = proposals.into_iter().unzip();
                (proposals, WarningFlags::flatten(&warns))
            }),
            |(proposals, warns)| (Self::SecurityAssociation(proposals), warns),
        )(input)
    }

    // Key Exchange - RFC7296
    //                      1                   2                   3
    //  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
    // +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    // |   Diffie-Hellman Group Num    |           RESERVED            |
    // +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    // |                                                               |
    // ~                       Key Exchange Data                       ~
    // |                                                               |
    // +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    fn parse_ke(input: &[u8]) -> IResult<(Self, Flags<WarningFlags>)> {
        map(
            tuple((be_u16, be_u16, rest)),
            |(dh_group, reserved, key_exchange_data): (_, _, &[u8])| {
                let mut warnings = WarningFlags::none();
                if reserved != 0 {
                    warnings |= WarningFlags::NonZeroReserved;
                }
                (
                    Self::KeyExchange {
                        dh_group,
                        key_exchange_data: key_exchange_data.to_vec(),
                    },
                    warnings,
                )
            },
        )(input)
    }

    // Authentication - RFC7296
    //                      1                   2                   3
    //  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
    // +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    // | Auth Method   |                RESERVED                       |
    // +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    // |                                                               |
    // ~                      Authentication Data                      ~
    // |                                                               |
    // +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    fn parse_authentication(input: &[u8]) -> IResult<(Self, Flags<WarningFlags>)> {
        map(
            tuple((be_u8, be_u24, rest)),
            |(auth_method, reserved, authentication_data): (_, _, &[u8])| {
                let mut warnings = WarningFlags::none();
                if reserved != 0 {
                    warnings |= WarningFlags::NonZeroReserved;
                }
                (
                    Self::Authentication {
                        auth_method,
                        authentication_data: authentication_data.to_vec(),
                    },
                    warnings,
                )
            },
        )(input)
    }

    // Notify - RFC7296
    //                      1                   2                   3
    //  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
    // +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    // |  Protocol ID  |   SPI Size    |      Notify Message Type      |
    // +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    // |                                                               |
    // ~                Security Parameter Index (SPI)                 ~
    // |                                                               |
    // +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    // |                                                               |
    // ~                       Notification Data                       ~
    // |                                                               |
    // +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    fn parse_notify(input: &[u8]) -> IResult<(Self, Flags<WarningFlags>)> {
        let (input, (protocol_id, spi_size, notify_message_type)) =
            tuple((be_u8, be_u8, be_u16))(input)?;
        let (input, spi) = take(spi_size)(input)?;
        let (input, notification_data) = rest(input)?;
        Ok((
            input,
            (
                Self::Notify {
                    protocol_id,
                    notify_message_type,
                    spi: spi.to_vec(),
                    notification_data: notification_data.to_vec(),
                },
                WarningFlags::none(),
            ),
        ))
    }

    // Delete - RFC7296
    //                      1                   2                   3
    //  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
    // +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    // | Protocol ID   |   SPI Size    |          Num of SPIs          |
    // +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    // |                                                               |
    // ~               Security Parameter Index(es) (SPI)              ~
    // |                                                               |
    // +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    fn parse_delete(input: &[u8]) -> IResult<(Self, Flags<WarningFlags>)> {
        let (input, (protocol_id, spi_size, num_spi)) = tuple((be_u8, be_u8, be_u16))(input)?;
        let (input, spis) = count(take(spi_size), num_spi as usize)(input)?;
        Ok((
            input,
            (
                Self::Delete {
                    protocol_id,
                    spi_size,
                    spis: spis.iter().map(|slice| slice.to_vec()).collect(),
                },
                WarningFlags::none(),
            ),
        ))
    }

    // Traffic Selector Init/Resp - RFC7296
    //                      1                   2                   3
    //  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
    // +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    // | Number of TSs |                 RESERVED                      |
    // +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    // |                                                               |
    // ~                       <Traffic Selectors>                     ~
    // |                                                               |
    // +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    fn parse_traffic_selectors(
        input: &[u8],
    ) -> IResult<(Vec<TrafficSelector>, Flags<WarningFlags>)> {
        let (input, (number_ts, reserved)) = tuple((be_u8, be_u24))(input)?;
        let mut warnings = WarningFlags::none();
        if reserved != 0 {
            warnings |= WarningFlags::NonZeroReserved;
        }
        let (input, selectors) = count(TrafficSelector::parse, number_ts as usize)(input)?;
        let (selectors, warns): (Vec<_>, Vec<_>) = selectors.into_iter().unzip();
        Ok((input, (selectors, warnings | WarningFlags::flatten(&warns))))
    }

    // Config - RFC7296
    //                      1                   2                   3
    //  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
    // +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    // |   CFG Type    |                    RESERVED                   |
    // +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    // |                                                               |
    // ~                   Configuration Attributes                    ~
    // |                                                               |
    // +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    fn parse_config(input: &[u8]) -> IResult<(Self, Flags<WarningFlags>)> {
        map(
            tuple((
                be_u8,
                be_u24,
                map(many0(complete(Attribute::parse)), |attributes| {
                    let (attributes, warns): (Vec<_>, Vec<_>) = attributes.into_iter().unzip();
                    (attributes, WarningFlags::flatten(&warns))
                }),
            )),
            |(cfg_type, reserved, (attributes, warns))| {
                let mut warnings = WarningFlags::none() | warns;
                if reserved != 0 {
                    warnings |= WarningFlags::NonZeroReserved;
                }
                (
                    Self::Configuration {
                        cfg_type,
                        attributes,
                    },
                    warnings,
                )
            },
        )(input)
    }

    // Simply takes the rest of the buffer, clones it into a vec and returns
    // it. Used for several types which are plain data buffers.
    fn parse_raw(input: &[u8]) -> IResult<(Vec<u8>, Flags<WarningFlags>)> {
        rest(input).map(|(i, data)| (i, (data.to_vec(), WarningFlags::none())))
    }
}

// Proposal - RFC7296
//                      1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// | Last Substruc |   RESERVED    |         Proposal Length       |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// | Proposal Num  |  Protocol ID  |    SPI Size   |Num  Transforms|
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// ~                        SPI (variable)                         ~
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                                                               |
// ~                        <Transforms>                           ~
// |                                                               |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Proposal {
    pub proposal_num: u8,
    pub protocol_id: u8,
    pub spi: Vec<u8>,
    pub transforms: Vec<Transform>,
}

impl Proposal {
    const FIXED_LEN: usize = 8;

    pub fn encoded_len(&self) -> usize {
        Self::FIXED_LEN
            + self.spi.len()
            + self.transforms.iter().map(Transform::encoded_len).sum::<usize>()
    }

    pub fn parse(input: &[u8]) -> IResult<(Self, Flags<WarningFlags>)> {
        let mut warnings = WarningFlags::none();
        let (input, (_last_substruc, reserved, _proposal_length, proposal_num, protocol_id)) =
            tuple((be_u8, be_u8, be_u16, be_u8, be_u8))(input)?;
        if reserved != 0 {
            warnings |= WarningFlags::NonZeroReserved;
        }
        let (input, (spi_size, num_transforms)) = tuple((be_u8, be_u8))(input)?;
        let (input, spi) = take(spi_size)(input)?;
        let (input, transforms) = count(Transform::parse, num_transforms as usize)(input)?;
        let (transforms, warns): (Vec<_>, Vec<_>) = transforms.into_iter().unzip();
        Ok((
            input,
            (
                Self {
                    proposal_num,
                    protocol_id,
                    spi: spi.to_vec(),
                    transforms,
                },
                warnings | WarningFlags::flatten(&warns),
            ),
        ))
    }

    pub fn generate(&self, enc: &mut Encoder, last: bool) -> Result<()> {
        let length = u16::try_from(self.encoded_len())
            .map_err(|_| Error::encoding("proposal exceeds 16-bit length field"))?;
        let spi_size = u8::try_from(self.spi.len())
            .map_err(|_| Error::encoding("proposal SPI exceeds 8-bit size field"))?;
        let num_transforms = u8::try_from(self.transforms.len())
            .map_err(|_| Error::encoding("transform count exceeds 8-bit field"))?;
        enc.put_u8(if last { 0 } else { 2 })?;
        enc.put_u8(0)?;
        enc.put_u16(length)?;
        enc.put_u8(self.proposal_num)?;
        enc.put_u8(self.protocol_id)?;
        enc.put_u8(spi_size)?;
        enc.put_u8(num_transforms)?;
        enc.put_slice(&self.spi)?;
        for (idx, transform) in self.transforms.iter().enumerate() {
            transform.generate(enc, idx + 1 == self.transforms.len())?;
        }
        Ok(())
    }
}

#[derive(Debug, FromPrimitive, IntoPrimitive, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum TransformType {
    Reserved = 0,
    EncryptionAlgorithm = 1,
    PseudoRandomFunction = 2,
    IntegrityCheck = 3,
    DiffieHellmanGroup = 4,
    ExtendedSequenceNumbers = 5,
    #[num_enum(default)]
    Unassigned = 255,
}

// Transform - RFC7296
//                      1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// | Last Substruc |   RESERVED    |        Transform Length       |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |Transform Type |   RESERVED    |          Transform ID         |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                                                               |
// ~                      Transform Attributes                     ~
// |                                                               |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Transform {
    pub transform_type: TransformType,
    pub transform_id: u16,
    pub attributes: Vec<Attribute>,
}

impl Transform {
    const FIXED_LEN: usize = 8;

    pub fn encoded_len(&self) -> usize {
        Self::FIXED_LEN + self.attributes.iter().map(Attribute::encoded_len).sum::<usize>()
    }

    pub fn parse(input: &[u8]) -> IResult<(Self, Flags<WarningFlags>)> {
        let mut warnings = WarningFlags::none();
        let (input, (_last_substruc, reserved, transform_length)) =
            tuple((be_u8, be_u8, be_u16))(input)?;
        let (input, (transform_type, reserved2, transform_id)) =
            tuple((map(be_u8, TransformType::from), be_u8, be_u16))(input)?;
        if reserved != 0 || reserved2 != 0 {
            warnings |= WarningFlags::NonZeroReserved;
        }
        if (transform_length as usize) < Self::FIXED_LEN {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Verify,
            )));
        }
        let (input, attributes_input) = take(transform_length as usize - Self::FIXED_LEN)(input)?;
        let (_attributes_input, attributes) =
            many0(complete(Attribute::parse))(attributes_input)?;
        let (attributes, warns): (Vec<_>, Vec<_>) = attributes.into_iter().unzip();
        Ok((
            input,
            (
                Self {
                    transform_type,
                    transform_id,
                    attributes,
                },
                warnings | WarningFlags::flatten(&warns),
            ),
        ))
    }

    pub fn generate(&self, enc: &mut Encoder, last: bool) -> Result<()> {
        let length = u16::try_from(self.encoded_len())
            .map_err(|_| Error::encoding("transform exceeds 16-bit length field"))?;
        enc.put_u8(if last { 0 } else { 3 })?;
        enc.put_u8(0)?;
        enc.put_u16(length)?;
        enc.put_u8(self.transform_type.into())?;
        enc.put_u8(0)?;
        enc.put_u16(self.transform_id)?;
        for attribute in &self.attributes {
            attribute.generate(enc)?;
        }
        Ok(())
    }
}

#[derive(Debug, FromPrimitive, IntoPrimitive, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum AttributeFormat {
    #[num_enum(default)]
    TypeLengthValue = 0,
    TypeValue = 1,
}

// Transform/Configuration Attribute - RFC7296
//                      1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |A!       Attribute Type        |    AF=0  Attribute Length     |
// |F!                             |    AF=1  Attribute Value      |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// .                   AF=0  Attribute Value                       .
// .                   AF=1  Not Transmitted                       .
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//
// AF dictates whether the attribute is TLV (AF = 0) or TV (AF = 1). In TV
// format the value is the two octets where TLV would carry the length.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Attribute {
    pub att_format: AttributeFormat,
    pub att_type: u16,
    pub att_value: Vec<u8>,
}

impl Attribute {
    const FORMAT_BIT: u16 = 0x8000;
    const TYPE_MASK: u16 = 0x7FFF;

    pub fn encoded_len(&self) -> usize {
        match self.att_format {
            AttributeFormat::TypeLengthValue => 4 + self.att_value.len(),
            AttributeFormat::TypeValue => 4,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<(Self, Flags<WarningFlags>)> {
        let (input, format_and_type) = be_u16(input)?;
        let att_format = AttributeFormat::from((format_and_type >> 15) as u8);
        let att_type = format_and_type & Self::TYPE_MASK;

        let (input, att_value) = match att_format {
            AttributeFormat::TypeLengthValue => {
                nom::multi::length_data(be_u16)(input)?
            }
            AttributeFormat::TypeValue => take(2usize)(input)?,
        };

        Ok((
            input,
            (
                Self {
                    att_format,
                    att_type,
                    att_value: att_value.to_vec(),
                },
                WarningFlags::none(),
            ),
        ))
    }

    pub fn generate(&self, enc: &mut Encoder) -> Result<()> {
        if self.att_type > Self::TYPE_MASK {
            return Err(Error::encoding("attribute type exceeds 15 bits"));
        }
        match self.att_format {
            AttributeFormat::TypeLengthValue => {
                let length = u16::try_from(self.att_value.len())
                    .map_err(|_| Error::encoding("attribute value exceeds 16-bit length field"))?;
                enc.put_u16(self.att_type)?;
                enc.put_u16(length)?;
                enc.put_slice(&self.att_value)
            }
            AttributeFormat::TypeValue => {
                if self.att_value.len() != 2 {
                    return Err(Error::encoding("type-value attribute must hold two octets"));
                }
                enc.put_u16(Self::FORMAT_BIT | self.att_type)?;
                enc.put_slice(&self.att_value)
            }
        }
    }
}

// Identification - RFC7296
//                      1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |   ID Type     |                 RESERVED                      |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                                                               |
// ~                   Identification Data                         ~
// |                                                               |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Identification {
    pub id_type: u8,
    pub identification_data: Vec<u8>,
}

impl Identification {
    pub fn encoded_len(&self) -> usize {
        4 + self.identification_data.len()
    }

    pub fn parse(input: &[u8]) -> IResult<(Self, Flags<WarningFlags>)> {
        map(
            tuple((be_u8, be_u24, rest)),
            |(id_type, reserved, identification_data): (_, _, &[u8])| {
                let mut warnings = WarningFlags::none();
                if reserved != 0 {
                    warnings |= WarningFlags::NonZeroReserved;
                }
                (
                    Self {
                        id_type,
                        identification_data: identification_data.to_vec(),
                    },
                    warnings,
                )
            },
        )(input)
    }

    pub fn generate(&self, enc: &mut Encoder) -> Result<()> {
        enc.put_u8(self.id_type)?;
        enc.put_u24(0)?;
        enc.put_slice(&self.identification_data)
    }
}

// Certificate - RFC7296
//                      1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// | Cert Encoding |                                               |
// +-+-+-+-+-+-+-+-+                                               |
// ~                       Certificate Data                        ~
// |                                                               |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Certificate {
    pub cert_encoding: u8,
    pub certificate_data: Vec<u8>,
}

impl Certificate {
    pub fn encoded_len(&self) -> usize {
        1 + self.certificate_data.len()
    }

    pub fn parse(input: &[u8]) -> IResult<(Self, Flags<WarningFlags>)> {
        map(
            tuple((be_u8, rest)),
            |(cert_encoding, certificate_data): (_, &[u8])| {
                (
                    Self {
                        cert_encoding,
                        certificate_data: certificate_data.to_vec(),
                    },
                    WarningFlags::none(),
                )
            },
        )(input)
    }

    pub fn generate(&self, enc: &mut Encoder) -> Result<()> {
        enc.put_u8(self.cert_encoding)?;
        enc.put_slice(&self.certificate_data)
    }
}

// Certificate Request - RFC7296; same layout as Certificate but the data is
// the acceptable certification authority.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct CertificateRequest {
    pub cert_encoding: u8,
    pub certification_authority: Vec<u8>,
}

impl CertificateRequest {
    pub fn encoded_len(&self) -> usize {
        1 + self.certification_authority.len()
    }

    pub fn parse(input: &[u8]) -> IResult<(Self, Flags<WarningFlags>)> {
        map(
            tuple((be_u8, rest)),
            |(cert_encoding, certification_authority): (_, &[u8])| {
                (
                    Self {
                        cert_encoding,
                        certification_authority: certification_authority.to_vec(),
                    },
                    WarningFlags::none(),
                )
            },
        )(input)
    }

    pub fn generate(&self, enc: &mut Encoder) -> Result<()> {
        enc.put_u8(self.cert_encoding)?;
        enc.put_slice(&self.certification_authority)
    }
}

// Traffic Selector - RFC7296
//                      1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |   TS Type     |IP Protocol ID*|       Selector Length         |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |           Start Port*         |           End Port*           |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                                                               |
// ~                         Starting Address*                     ~
// |                                                               |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                                                               |
// ~                         Ending Address*                       ~
// |                                                               |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//
// TS types 7 (IPv4 range) and 8 (IPv6 range) are decoded; other types keep
// their body opaque.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum TrafficSelector {
    Ipv4 {
        ip_protocol_id: u8,
        start_port: u16,
        end_port: u16,
        starting_address: std::net::Ipv4Addr,
        ending_address: std::net::Ipv4Addr,
    },
    Ipv6 {
        ip_protocol_id: u8,
        start_port: u16,
        end_port: u16,
        starting_address: std::net::Ipv6Addr,
        ending_address: std::net::Ipv6Addr,
    },
    Unknown {
        ts_type: u8,
        ip_protocol_id: u8,
        body: Vec<u8>,
    },
}

impl TrafficSelector {
    const TS_IPV4_ADDR_RANGE: u8 = 7;
    const TS_IPV6_ADDR_RANGE: u8 = 8;
    const FIXED_LEN: usize = 4;

    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Ipv4 { .. } => 16,
            Self::Ipv6 { .. } => 40,
            Self::Unknown { body, .. } => Self::FIXED_LEN + body.len(),
        }
    }

    pub fn parse(input: &[u8]) -> IResult<(Self, Flags<WarningFlags>)> {
        let (input, (ts_type, ip_protocol_id, selector_length)) =
            tuple((be_u8, be_u8, be_u16))(input)?;
        if (selector_length as usize) < Self::FIXED_LEN {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Verify,
            )));
        }
        let (input, selector_input) = take(selector_length as usize - Self::FIXED_LEN)(input)?;

        let selector = match ts_type {
            Self::TS_IPV4_ADDR_RANGE => {
                let (_selector_input, (start_port, end_port, starting_address, ending_address)) =
                    tuple((be_u16, be_u16, be_u32, be_u32))(selector_input)?;
                Self::Ipv4 {
                    ip_protocol_id,
                    start_port,
                    end_port,
                    starting_address: std::net::Ipv4Addr::from(starting_address),
                    ending_address: std::net::Ipv4Addr::from(ending_address),
                }
            }
            Self::TS_IPV6_ADDR_RANGE => {
                let (_selector_input, (start_port, end_port, starting_address, ending_address)) =
                    tuple((be_u16, be_u16, take(16usize), take(16usize)))(selector_input)?;
                // SAFETY:
                // The two slices are guaranteed to be exactly 16 bytes.
                let starting_address: [u8; 16] = starting_address[0..16].try_into().unwrap();
                let ending_address: [u8; 16] = ending_address[0..16].try_into().unwrap();
                Self::Ipv6 {
                    ip_protocol_id,
                    start_port,
                    end_port,
                    starting_address: std::net::Ipv6Addr::from(starting_address),
                    ending_address: std::net::Ipv6Addr::from(ending_address),
                }
            }
            _ => Self::Unknown {
                ts_type,
                ip_protocol_id,
                body: selector_input.to_vec(),
            },
        };

        Ok((input, (selector, WarningFlags::none())))
    }

    pub fn generate(&self, enc: &mut Encoder) -> Result<()> {
        let selector_length = u16::try_from(self.encoded_len())
            .map_err(|_| Error::encoding("selector exceeds 16-bit length field"))?;
        match self {
            Self::Ipv4 {
                ip_protocol_id,
                start_port,
                end_port,
                starting_address,
                ending_address,
            } => {
                enc.put_u8(Self::TS_IPV4_ADDR_RANGE)?;
                enc.put_u8(*ip_protocol_id)?;
                enc.put_u16(selector_length)?;
                enc.put_u16(*start_port)?;
                enc.put_u16(*end_port)?;
                enc.put_u32((*starting_address).into())?;
                enc.put_u32((*ending_address).into())?;
            }
            Self::Ipv6 {
                ip_protocol_id,
                start_port,
                end_port,
                starting_address,
                ending_address,
            } => {
                enc.put_u8(Self::TS_IPV6_ADDR_RANGE)?;
                enc.put_u8(*ip_protocol_id)?;
                enc.put_u16(selector_length)?;
                enc.put_u16(*start_port)?;
                enc.put_u16(*end_port)?;
                enc.put_slice(&starting_address.octets())?;
                enc.put_slice(&ending_address.octets())?;
            }
            Self::Unknown {
                ts_type,
                ip_protocol_id,
                body,
            } => {
                enc.put_u8(*ts_type)?;
                enc.put_u8(*ip_protocol_id)?;
                enc.put_u16(selector_length)?;
                enc.put_slice(body)?;
            }
        }
        Ok(())
    }
}
