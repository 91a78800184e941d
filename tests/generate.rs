use ike_codec::error::{Error, ErrorKind};
use ike_codec::header::{ExchangeType, Header, IkeFlags, HEADER_LEN};
use ike_codec::payloads::{
    Attribute, AttributeFormat, Identification, Payload, PayloadData, Proposal, TrafficSelector,
    Transform, TransformType,
};
use ike_codec::{Message, Parser, WarningFlags};

use rstest::rstest;
use sawp_flags::{Flag, Flags};

#[test]
fn header_only_message() {
    let message = Message::new(
        Header::new(
            0x1122334455667788,
            0,
            ExchangeType::IkeSaInit,
            IkeFlags::INITIATOR.into(),
            0,
        ),
        Vec::new(),
    );
    assert_eq!(
        message.to_bytes().unwrap(),
        [
            0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x20, 0x22, 0x20, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1c,
        ]
    );
}

#[test]
fn version_byte_is_always_two_dot_zero() {
    let mut header = Header::new(1, 2, ExchangeType::Informational, IkeFlags::RESPONSE.into(), 9);
    header.major_version = 9;
    header.minor_version = 5;
    let bytes = Message::new(header, Vec::new()).to_bytes().unwrap();
    assert_eq!(bytes[17], 0x20);
}

#[test]
fn stale_length_field_is_backpatched() {
    let mut message = Message::new(
        Header::new(1, 2, ExchangeType::Informational, IkeFlags::RESPONSE.into(), 1),
        vec![Payload::new(PayloadData::Nonce(vec![0xaa; 16]))],
    );
    message.header.length = 999;
    message.link();
    let bytes = message.to_bytes().unwrap();
    assert_eq!(bytes.len(), 48);
    assert_eq!(&bytes[24..28], &[0x00, 0x00, 0x00, 0x30]);
}

#[rstest(flags, expected_byte,
    case::none(0x00, 0x00),
    case::response(IkeFlags::RESPONSE.bits(), 0x08),
    case::version(IkeFlags::VERSION.bits(), 0x10),
    case::initiator(IkeFlags::INITIATOR.bits(), 0x20),
    case::initiator_response(IkeFlags::INITIATOR.bits() | IkeFlags::RESPONSE.bits(), 0x28),
)]
fn flag_bits_are_isolated(flags: u8, expected_byte: u8) {
    let header = Header::new(
        1,
        2,
        ExchangeType::IkeSaInit,
        Flags::<IkeFlags>::from_bits(flags),
        0,
    );
    let bytes = Message::new(header, Vec::new()).to_bytes().unwrap();
    assert_eq!(bytes[19], expected_byte);
}

#[test]
fn unlinked_chain_is_rejected_before_any_bytes() {
    // Two payloads but no link() call: the header still points at nothing.
    let message = Message::new(
        Header::new(1, 2, ExchangeType::Informational, IkeFlags::RESPONSE.into(), 1),
        vec![
            Payload::new(PayloadData::Nonce(vec![0x01; 8])),
            Payload::new(PayloadData::VendorId(vec![0x02; 8])),
        ],
    );
    assert_eq!(
        message.to_bytes(),
        Err(Error::chain("header link does not match first payload"))
    );
}

#[test]
fn broken_middle_link_is_rejected() {
    let mut message = Message::new(
        Header::new(1, 2, ExchangeType::Informational, IkeFlags::RESPONSE.into(), 1),
        vec![
            Payload::new(PayloadData::Nonce(vec![0x01; 8])),
            Payload::new(PayloadData::VendorId(vec![0x02; 8])),
        ],
    );
    message.link();
    message.payloads[0].set_next(41);
    assert_eq!(
        message.to_bytes(),
        Err(Error::chain("link does not match following payload"))
    );
}

#[test]
fn dangling_last_link_is_rejected() {
    let mut message = Message::new(
        Header::new(1, 2, ExchangeType::Informational, IkeFlags::RESPONSE.into(), 1),
        vec![Payload::new(PayloadData::Nonce(vec![0x01; 8]))],
    );
    message.link();
    message.payloads[0].set_next(43);
    assert_eq!(
        message.to_bytes(),
        Err(Error::chain("last payload does not end the chain"))
    );
}

#[test]
fn unknown_exchange_type_cannot_be_generated() {
    let message = Message::new(
        Header::new(1, 2, ExchangeType::Unknown, IkeFlags::RESPONSE.into(), 1),
        Vec::new(),
    );
    assert_eq!(
        message.to_bytes(),
        Err(Error::encoding("exchange type has no wire code"))
    );
}

fn round_trip(mut message: Message) {
    message.link();
    let bytes = message.to_bytes().unwrap();
    let parsed = Parser::default().parse(&bytes).unwrap();

    let mut expected_header = message.header.clone();
    expected_header.length = bytes.len() as u32;
    assert_eq!(parsed.header, expected_header);
    assert_eq!(parsed.payloads, message.payloads);
    assert_eq!(parsed.warnings, WarningFlags::none());
}

#[test]
fn sa_init_round_trip() {
    round_trip(Message::new(
        Header::new(
            0x0123456789abcdef,
            0,
            ExchangeType::IkeSaInit,
            IkeFlags::INITIATOR.into(),
            0,
        ),
        vec![
            Payload::new(PayloadData::SecurityAssociation(vec![Proposal {
                proposal_num: 1,
                protocol_id: 1,
                spi: Vec::new(),
                transforms: vec![
                    Transform {
                        transform_type: TransformType::EncryptionAlgorithm,
                        transform_id: 20,
                        attributes: vec![Attribute {
                            att_format: AttributeFormat::TypeValue,
                            att_type: 14,
                            att_value: vec![0x01, 0x00],
                        }],
                    },
                    Transform {
                        transform_type: TransformType::PseudoRandomFunction,
                        transform_id: 5,
                        attributes: Vec::new(),
                    },
                    Transform {
                        transform_type: TransformType::DiffieHellmanGroup,
                        transform_id: 19,
                        attributes: Vec::new(),
                    },
                ],
            }])),
            Payload::new(PayloadData::KeyExchange {
                dh_group: 19,
                key_exchange_data: vec![0x5a; 64],
            }),
            Payload::new(PayloadData::Nonce(vec![0xc3; 32])),
        ],
    ));
}

#[test]
fn auth_exchange_round_trip() {
    round_trip(Message::new(
        Header::new(
            0x0123456789abcdef,
            0xfedcba9876543210,
            ExchangeType::IkeAuth,
            IkeFlags::RESPONSE.into(),
            1,
        ),
        vec![
            Payload::new(PayloadData::IdentificationResponder(Identification {
                id_type: 2,
                identification_data: b"gw.example.org".to_vec(),
            })),
            Payload::new(PayloadData::Authentication {
                auth_method: 2,
                authentication_data: vec![0x7e; 20],
            }),
            Payload::new(PayloadData::TrafficSelectorInitiator(vec![
                TrafficSelector::Ipv4 {
                    ip_protocol_id: 0,
                    start_port: 0,
                    end_port: 65535,
                    starting_address: "10.0.0.0".parse().unwrap(),
                    ending_address: "10.0.0.255".parse().unwrap(),
                },
            ])),
            Payload::new(PayloadData::TrafficSelectorResponder(vec![
                TrafficSelector::Ipv6 {
                    ip_protocol_id: 17,
                    start_port: 500,
                    end_port: 500,
                    starting_address: "2001:db8::1".parse().unwrap(),
                    ending_address: "2001:db8::1".parse().unwrap(),
                },
            ])),
        ],
    ));
}

#[test]
fn informational_round_trip() {
    round_trip(Message::new(
        Header::new(
            0x0123456789abcdef,
            0xfedcba9876543210,
            ExchangeType::Informational,
            IkeFlags::INITIATOR.into(),
            7,
        ),
        vec![
            Payload::new(PayloadData::Notify {
                protocol_id: 0,
                notify_message_type: 16396,
                spi: Vec::new(),
                notification_data: vec![0x11, 0x22, 0x33, 0x44],
            }),
            Payload::new(PayloadData::Delete {
                protocol_id: 3,
                spi_size: 4,
                spis: vec![vec![0x00, 0x00, 0x12, 0x34], vec![0x00, 0x00, 0x56, 0x78]],
            }),
        ],
    ));
}

#[test]
fn unknown_payload_round_trips_byte_exactly() {
    let mut message = Message::new(
        Header::new(1, 2, ExchangeType::Informational, IkeFlags::RESPONSE.into(), 3),
        vec![Payload::new(PayloadData::Unknown {
            type_code: 201,
            data: vec![0xde, 0xad, 0xbe, 0xef],
        })],
    );
    message.link();
    let bytes = message.to_bytes().unwrap();
    assert_eq!(bytes[16], 201);

    let parsed = Parser::default().parse(&bytes).unwrap();
    assert_eq!(parsed.payloads, message.payloads);
    assert_eq!(parsed.warnings, Flags::from(WarningFlags::UnknownPayload));
    assert_eq!(parsed.to_bytes().unwrap(), bytes);
}

#[test]
fn critical_bit_round_trips() {
    let mut payload = Payload::new(PayloadData::VendorId(vec![0xaa; 8]));
    payload.critical = true;
    let mut message = Message::new(
        Header::new(1, 2, ExchangeType::Informational, IkeFlags::RESPONSE.into(), 3),
        vec![payload],
    );
    message.link();
    let bytes = message.to_bytes().unwrap();
    assert_eq!(bytes[29], 0x80);

    let parsed = Parser::default().parse(&bytes).unwrap();
    assert!(parsed.payloads[0].critical);
}

#[test]
fn encrypted_payload_round_trips_as_opaque_blob() {
    let mut message = Message::new(
        Header::new(1, 2, ExchangeType::IkeAuth, IkeFlags::INITIATOR.into(), 1),
        vec![Payload::new(PayloadData::EncryptedAndAuthenticated(
            vec![0x42; 40],
        ))],
    );
    message.link();
    let bytes = message.to_bytes().unwrap();
    let parsed = Parser::default().parse(&bytes).unwrap();
    assert_eq!(parsed.payloads, message.payloads);
}

#[rstest(payload, expected,
    case::oversized_body(
        Payload::new(PayloadData::Nonce(vec![0x00; 70_000])),
        Error::encoding("payload body exceeds 16-bit length field"),
    ),
    case::notify_spi_too_long(
        Payload::new(PayloadData::Notify {
            protocol_id: 1,
            notify_message_type: 7,
            spi: vec![0x00; 256],
            notification_data: Vec::new(),
        }),
        Error::encoding("notify SPI exceeds 8-bit size field"),
    ),
    case::delete_spi_size_mismatch(
        Payload::new(PayloadData::Delete {
            protocol_id: 3,
            spi_size: 4,
            spis: vec![vec![0x12, 0x34]],
        }),
        Error::encoding("delete SPI does not match declared size"),
    ),
    case::type_value_attribute_needs_two_octets(
        Payload::new(PayloadData::SecurityAssociation(vec![Proposal {
            proposal_num: 1,
            protocol_id: 1,
            spi: Vec::new(),
            transforms: vec![Transform {
                transform_type: TransformType::EncryptionAlgorithm,
                transform_id: 12,
                attributes: vec![Attribute {
                    att_format: AttributeFormat::TypeValue,
                    att_type: 14,
                    att_value: vec![0x01],
                }],
            }],
        }])),
        Error::encoding("type-value attribute must hold two octets"),
    ),
)]
fn encoding_limits(payload: Payload, expected: Error) {
    let mut message = Message::new(
        Header::new(1, 2, ExchangeType::Informational, IkeFlags::RESPONSE.into(), 1),
        vec![payload],
    );
    message.link();
    assert_eq!(message.to_bytes(), Err(expected));
}

#[test]
fn encoded_len_matches_emitted_bytes() {
    let mut message = Message::new(
        Header::new(1, 2, ExchangeType::IkeSaInit, IkeFlags::INITIATOR.into(), 0),
        vec![
            Payload::new(PayloadData::Nonce(vec![0x01; 24])),
            Payload::new(PayloadData::VendorId(vec![0x02; 12])),
        ],
    );
    message.link();
    let bytes = message.to_bytes().unwrap();
    assert_eq!(bytes.len(), message.encoded_len());
    assert_eq!(message.encoded_len(), HEADER_LEN as usize + 28 + 16);
}

#[test]
fn length_mismatch_reports_both_sizes() {
    let mut message = Message::new(
        Header::new(1, 2, ExchangeType::Informational, IkeFlags::RESPONSE.into(), 1),
        vec![Payload::new(PayloadData::Nonce(vec![0x01; 8]))],
    );
    message.link();
    let mut bytes = message.to_bytes().unwrap();
    bytes.push(0x00);
    assert_eq!(
        Parser::default().parse(&bytes),
        Err(Error::new(ErrorKind::LengthMismatch {
            declared: 40,
            actual: 41
        }))
    );
}
