//! Tests for packet framing and decoding

mod common;

use common::*;

const ALL_KINDS: [PacketType; 4] = [
    PacketType::Xy,
    PacketType::Xyz,
    PacketType::XyPpuResp,
    PacketType::XyzPpuResp,
];

#[test]
fn test_canonical_packets_decode() {
    let baseline = Packet::try_from(ZERO_PACKET.clone()).expect("baseline should decode");
    assert_eq!(baseline.kind, PacketType::XyPpuResp);
    assert_eq!(baseline.voltages, Voltages::default());
    assert_eq!(baseline.status(), Some(Status::RESP_ACTIVE));

    let pulse = Packet::try_from(MAX_PPU_PACKET.clone()).expect("pulse should decode");
    assert_eq!(pulse.kind, PacketType::XyPpuResp);
    assert_eq!(pulse.voltages, Voltages::ppu(8191));
    assert_eq!(pulse.status(), Some(Status::RESP_ACTIVE));

    let baseline_cksum = ZERO_PACKET[ZERO_PACKET.len() - 2];
    let pulse_cksum = MAX_PPU_PACKET[MAX_PPU_PACKET.len() - 2];
    assert_eq!(baseline_cksum, 0x8A);
    assert_eq!(pulse_cksum, 0xCA);
    assert_ne!(baseline_cksum, pulse_cksum);
}

#[test]
fn test_frame_shape_for_every_type() {
    let voltages = Voltages {
        ecg_x: -8192,
        ecg_y: 8191,
        ecg_z: -1,
        ppu: 1234,
        resp: -4321,
    };

    for kind in ALL_KINDS {
        let status = Status::ECG_CONNECTED.to_bytes();
        let frame = construct_packet(kind, &voltages, &status).unwrap();

        assert_eq!(frame[0], SOM, "{kind}");
        assert_eq!(frame[frame.len() - 1], EOM, "{kind}");
        assert_eq!(frame[1], u8::from(kind));
        assert_eq!(frame.len(), 4 + 2 * kind.channel_count() + status.len(), "{kind}");

        // every channel byte carries the marker bit, nothing reserved inside
        let channels_end = 2 + 2 * kind.channel_count();
        assert!(frame[2..channels_end].iter().all(|b| b & 0x80 != 0));
        assert!(frame[1..frame.len() - 1].iter().all(|b| !RESERVED_BYTES.contains(b)));

        let decoded = Packet::try_from(frame.clone()).unwrap();
        assert_eq!(decoded.kind, kind);
        assert_eq!(decoded.voltages.channels(kind), voltages.channels(kind));
        assert_eq!(decoded.status.as_ref(), &status);
    }
}

#[test]
fn test_absent_channels_decode_as_zero() {
    let voltages = Voltages {
        ecg_x: 10,
        ecg_y: 20,
        ecg_z: 30,
        ppu: 40,
        resp: 50,
    };
    let frame = construct_packet(PacketType::Xy, &voltages, b"SV03\n").unwrap();
    let decoded = Packet::try_from(frame).unwrap();
    assert_eq!(
        decoded.voltages,
        Voltages {
            ecg_x: 10,
            ecg_y: 20,
            ..Voltages::default()
        }
    );
}

#[test]
fn test_packet_encode_matches_construct() {
    let packet = Packet::new(PacketType::XyzPpuResp, Voltages::ppu(-300), Status::PPU_ACTIVE);
    let expected = construct_packet(PacketType::XyzPpuResp, &Voltages::ppu(-300), b"SS03\n").unwrap();
    assert_eq!(packet.encode().unwrap(), expected);
}

#[test]
fn test_out_of_range_voltage_fails_construction() {
    let err = construct_packet(PacketType::XyPpuResp, &Voltages::ppu(8192), b"SS03\n").unwrap_err();
    assert!(matches!(err, CdasError::VoltageOutOfRange { value: 8192 }));

    let err = construct_packet(
        PacketType::Xy,
        &Voltages {
            ecg_y: -8193,
            ..Voltages::default()
        },
        b"SV03\n",
    )
    .unwrap_err();
    assert!(matches!(err, CdasError::VoltageOutOfRange { value: -8193 }));
}

#[test]
fn test_escaped_checksum_frame() {
    // status chosen so DATA xors to EOM (0x0D)
    let status = [b'S', b'S', b'0', b'3', 0x8C];
    let frame = construct_packet(PacketType::XyPpuResp, &Voltages::default(), &status).unwrap();
    assert_eq!(frame[frame.len() - 2], 0xF2);

    let decoded = Packet::try_from(frame).unwrap();
    assert_eq!(decoded.status.as_ref(), &status);
    assert_eq!(decoded.status(), None);
}

#[test]
fn test_rejects_damaged_frames() {
    let good = ZERO_PACKET.as_ref().to_vec();

    let mut bad_som = good.clone();
    bad_som[0] = 0x03;
    assert!(matches!(
        Packet::try_from(Bytes::from(bad_som)),
        Err(CdasError::InvalidPacket(_))
    ));

    let mut bad_eom = good.clone();
    *bad_eom.last_mut().unwrap() = 0x0A;
    assert!(matches!(
        Packet::try_from(Bytes::from(bad_eom)),
        Err(CdasError::InvalidPacket(_))
    ));

    let mut bad_cksum = good.clone();
    let at = bad_cksum.len() - 2;
    bad_cksum[at] ^= 0x01;
    assert!(matches!(
        Packet::try_from(Bytes::from(bad_cksum)),
        Err(CdasError::ChecksumMismatch {
            expected: 0x8A,
            actual: 0x8B
        })
    ));

    let mut bad_type = good.clone();
    bad_type[1] = 0x84;
    assert!(matches!(
        Packet::try_from(Bytes::from(bad_type)),
        Err(CdasError::UnknownPacketType(0x84))
    ));
}

#[test]
fn test_rejects_truncated_frames() {
    let test_cases = vec![
        (vec![], "Empty frame"),
        (vec![0x02, 0x0D], "SOM + EOM"),
        (vec![0x02, 0x80, 0x80, 0x0D], "Header only"),
        (vec![0x02, 0x82, 0x80, 0x80, 0x80, 0x80, 0x82, 0x0D], "Missing channels"),
    ];

    for (bytes_vec, description) in test_cases {
        match Packet::try_from(Bytes::from(bytes_vec)) {
            Err(CdasError::InvalidPacket(msg)) => {
                assert!(msg.contains("too short"), "{}: unexpected message {}", description, msg);
            }
            other => panic!("{}: Expected InvalidPacket error, got: {:?}", description, other),
        }
    }
}

#[test]
fn test_voltage_decode_rejects_missing_marker() {
    let mut frame = MAX_PPU_PACKET.as_ref().to_vec();
    // clear the marker of the PPU low byte, then fix up the checksum
    frame[7] &= 0x7F;
    let at = frame.len() - 2;
    frame[at] = compute_checksum(&frame[1..at]);
    assert!(matches!(
        Packet::try_from(Bytes::from(frame)),
        Err(CdasError::InvalidPacket(_))
    ));
}
