use bytes_util::BitWriter;
use dca::{DcaFramer, DcaFramerConfig, DcaProfile, DcaSpeakerMask, SyncFamily, parse_frame_parameters};

fn init_tracing() {
    let _ = tracing_subscriber::fmt::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// A 16-bit big endian core frame of `frame_size` bytes at 44.1 kHz.
fn core_frame(npcmblocks: u64, frame_size: u64, audio_mode: u64) -> Vec<u8> {
    let mut w = BitWriter::<Vec<u8>>::default();
    w.write_bits(0x7FFE_8001, 32).unwrap();
    w.write_bit(true).unwrap();
    w.write_bits(31, 5).unwrap();
    w.write_bit(false).unwrap();
    w.write_bits(npcmblocks - 1, 7).unwrap();
    w.write_bits(frame_size - 1, 14).unwrap();
    w.write_bits(audio_mode, 6).unwrap();
    w.write_bits(8, 4).unwrap();
    w.write_bits(15, 5).unwrap();
    w.write_bits(0, 5).unwrap();
    w.write_bits(0, 3).unwrap();
    w.write_bit(false).unwrap();
    w.write_bit(false).unwrap();
    w.write_bits(0, 2).unwrap();
    w.write_bit(false).unwrap();
    w.write_bit(false).unwrap();
    w.write_bits(7, 4).unwrap();
    w.write_bits(0, 2).unwrap();
    w.write_bits(0, 3).unwrap();
    w.write_bits(0, 6).unwrap();

    let mut frame = w.finish().unwrap();
    frame.resize(frame_size as usize, 0);
    frame
}

/// Sets the extension flag and appends a 96 byte XCH frame.
fn with_xch(mut frame: Vec<u8>) -> Vec<u8> {
    frame[10] |= 0x10;
    let start = frame.len() - 96;
    frame[start..start + 4].copy_from_slice(&[0x5A; 4]);
    let word: u32 = (95 << 22) | (8 << 15);
    frame[start + 4..start + 8].copy_from_slice(&word.to_be_bytes());
    frame
}

fn push_in_chunks(data: &[u8], chunk: usize) -> Vec<dca::DcaFrame> {
    let mut framer = DcaFramer::new(DcaFramerConfig::default());
    let mut frames = Vec::new();
    for piece in data.chunks(chunk) {
        frames.extend(framer.push(piece));
    }
    frames.extend(framer.flush());
    frames
}

#[test]
fn splits_stream_regardless_of_chunking() {
    init_tracing();

    let frames = [
        core_frame(16, 700, 2),
        core_frame(16, 700, 2),
        core_frame(8, 512, 2),
        core_frame(16, 700, 2),
    ];
    let mut stream = b"junk before the stream".to_vec();
    for frame in &frames {
        stream.extend_from_slice(frame);
    }

    for chunk in [1, 3, 6, 188, 699, 4096] {
        let out = push_in_chunks(&stream, chunk);
        assert_eq!(out.len(), frames.len(), "chunk size {chunk}");
        for (got, want) in out.iter().zip(&frames) {
            assert_eq!(&got.data[..], &want[..], "chunk size {chunk}");
        }

        let durations: Vec<_> = out.iter().map(|f| f.params.map(|p| p.duration)).collect();
        assert_eq!(durations, [Some(512), Some(512), Some(256), Some(512)]);
    }
}

#[test]
fn little_endian_stream() {
    let frame: Vec<u8> = core_frame(16, 700, 2)
        .chunks_exact(2)
        .flat_map(|pair| [pair[1], pair[0]])
        .collect();
    assert_eq!(SyncFamily::detect(&frame), Some(SyncFamily::CoreLe));

    let stream = [frame.clone(), frame.clone(), frame.clone()].concat();
    let out = push_in_chunks(&stream, 100);
    assert_eq!(out.len(), 3);
    for f in out {
        let params = f.params.unwrap();
        assert_eq!((params.sample_rate, params.channel_mask), (44100, DcaSpeakerMask::LAYOUT_STEREO));
        assert_eq!(params.wav_layout.mask, 0x3);
        assert_eq!(params.wav_layout.remap(), [1, 2]);
    }
}

#[test]
fn xch_frames_report_6_1() {
    let frame = with_xch(core_frame(16, 1024, 9));
    let params = parse_frame_parameters(&frame).unwrap();
    assert_eq!(params.profile, DcaProfile::DtsEs);
    assert_eq!(
        params.channel_mask,
        DcaSpeakerMask::LAYOUT_5_0 | DcaSpeakerMask::CS
    );
    // FL FR FC BC SL SR
    assert_eq!(params.wav_layout.mask, 0x707);
    assert_eq!(params.wav_layout.remap(), [1, 2, 0, 6, 3, 4]);
    assert_eq!(params.wav_layout.channels(), 6);

    let stream = [frame.clone(), frame].concat();
    let out = push_in_chunks(&stream, 50);
    assert_eq!(out.len(), 2);
    assert!(out.iter().all(|f| f.params == Some(params)));
}

#[test]
fn unreadable_frames_have_no_parameters() {
    // audio modes above 9 are user defined
    let frame = core_frame(16, 700, 15);
    let stream = [frame.clone(), frame].concat();

    let out = push_in_chunks(&stream, 256);
    assert_eq!(out.len(), 2);
    assert!(out.iter().all(|f| f.params.is_none()));
}
