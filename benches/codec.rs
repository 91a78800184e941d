use criterion::{black_box, criterion_group, criterion_main, Criterion};

use ike_codec::header::{ExchangeType, Header, IkeFlags};
use ike_codec::payloads::{Payload, PayloadData, Proposal, Transform, TransformType};
use ike_codec::{Message, Parser};

fn sa_init_message() -> Message {
    let mut message = Message::new(
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
                        attributes: Vec::new(),
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
    );
    message.link();
    message
}

fn criterion_benchmark(c: &mut Criterion) {
    let message = sa_init_message();
    let bytes = message.to_bytes().unwrap();
    let parser = Parser::default();

    c.bench_function("parse_sa_init", |b| {
        b.iter(|| parser.parse(black_box(&bytes)))
    });
    c.bench_function("generate_sa_init", |b| b.iter(|| message.to_bytes()));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
