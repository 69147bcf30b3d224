//! Integration tests for the create, append, reopen cycle

use chrono::NaiveDateTime;
use tempfile::TempDir;

use wiff::config::DATE_FMT;
use wiff::storage::{ChunkTag, PAGE_SIZE};
use wiff::{
    Annotation, AnnotationKind, AnnotationQuery, ChannelConfig, ChannelSet, Compression,
    MarkerCode, MetaEntry, MetaLevel, MetaValue, Recording, RecordingConfig, WiffError,
};

fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, DATE_FMT).unwrap()
}

/// Two 12-bit channels
fn create_test_config() -> RecordingConfig {
    RecordingConfig {
        start: ts("20010203 040506.070809"),
        end: ts("20010203 050506.070809"),
        description: "integration".to_string(),
        fs: 500,
        channels: vec![
            ChannelConfig::new("I", 12, "uV").with_comment("lead I"),
            ChannelConfig::new("II", 12, "uV").with_comment("lead II"),
        ],
    }
}

fn create_recording(dir: &TempDir, name: &str) -> Recording {
    Recording::create(&dir.path().join(name), &create_test_config()).unwrap()
}

fn both() -> ChannelSet {
    [0u8, 1].into_iter().collect()
}

fn sample_annotations() -> Vec<Annotation> {
    vec![
        Annotation::Comment {
            fidx_start: 10,
            fidx_end: 30,
            text: "noise".to_string(),
        },
        Annotation::Marker {
            fidx_start: 40,
            fidx_end: 40,
            code: MarkerCode::new("QRS ").unwrap(),
        },
        Annotation::MarkerWithValue {
            fidx_start: 50,
            fidx_end: 55,
            code: MarkerCode::new("HR  ").unwrap(),
            value: 72,
        },
    ]
}

#[test]
fn test_frame_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let mut rec = create_recording(&temp_dir, "rt.wiff");

    rec.new_segment(&both(), Compression::None, None).unwrap();
    rec.add_frames(&[vec![vec![0xABu8, 0x00], vec![0xCD, 0x00]]])
        .unwrap();

    let frame = rec.get_frame(0).unwrap();
    assert_eq!(frame.samples, vec![(0, 0x0AB), (1, 0x0CD)]);
    assert_eq!(rec.num_frames().unwrap(), 1);
    assert!(matches!(rec.get_frame(1), Err(WiffError::NotFound(_))));
}

#[test]
fn test_resize_relocates_following_chunk() {
    let temp_dir = TempDir::new().unwrap();
    let mut rec = create_recording(&temp_dir, "grow.wiff");

    rec.new_segment(&both(), Compression::None, None).unwrap();
    rec.add_frame_values(&[[1u64, 2]]).unwrap();
    rec.new_annotations(Compression::None).unwrap();
    for a in sample_annotations() {
        rec.add_annotation(&a).unwrap();
    }

    let anno_offset = |rec: &Recording| {
        rec.backing_files()[0]
            .chunks()
            .chunks()
            .iter()
            .find(|c| c.tag == ChunkTag::Anno)
            .unwrap()
            .offset
    };
    let before = anno_offset(&rec);
    assert_eq!(before, 2 * PAGE_SIZE);

    // Fits in two pages: (8192 - 72) / 4 = 2030 frames
    let frames: Vec<[u64; 2]> = (1..1100u64).map(|i| [i % 4096, (i * 3) % 4096]).collect();
    rec.add_frame_values(&frames).unwrap();

    assert_eq!(anno_offset(&rec), before + PAGE_SIZE);
    assert_eq!(rec.get_frame(0).unwrap().samples, vec![(0, 1), (1, 2)]);
    assert_eq!(rec.get_frame(1099).unwrap().sample(1), Some((1099 * 3) % 4096));

    let stored: Vec<Annotation> = rec
        .annotations(&AnnotationQuery::all())
        .unwrap()
        .into_iter()
        .map(|(_, a)| a)
        .collect();
    assert_eq!(stored, sample_annotations());
}

#[test]
fn test_multi_file_addressing() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("a.wiff");
    {
        let mut rec = Recording::create(&path, &create_test_config()).unwrap();

        rec.new_segment(&both(), Compression::None, None).unwrap();
        let first: Vec<[u64; 2]> = (0..10u64).map(|i| [i, 100 + i]).collect();
        rec.add_frame_values(&first).unwrap();

        assert_eq!(rec.add_file("b.wiff").unwrap(), 1);
        rec.new_segment(&both(), Compression::None, None).unwrap();
        let second: Vec<[u64; 2]> = (10..20u64).map(|i| [i, 100 + i]).collect();
        rec.add_frame_values(&second).unwrap();

        rec.close().unwrap();
    }

    let rec = Recording::open(&path).unwrap();
    assert_eq!(rec.num_files().unwrap(), 2);

    let files = rec.files().unwrap();
    assert_eq!(files[1].name, "b.wiff");
    assert_eq!((files[0].fidx_start, files[0].fidx_end), (0, 10));
    assert_eq!((files[1].fidx_start, files[1].fidx_end), (10, 20));

    let frame = rec.get_frame(15).unwrap();
    assert_eq!(frame.samples, vec![(0, 15), (1, 115)]);
    let segment = rec
        .segments()
        .unwrap()
        .into_iter()
        .find(|s| (s.fidx_start..s.fidx_end).contains(&15))
        .unwrap();
    assert_eq!(segment.file, 1);

    let all: Vec<u64> = rec
        .frames(0..100)
        .unwrap()
        .map(|f| f.unwrap().sample(0).unwrap())
        .collect();
    assert_eq!(all, (0..20).collect::<Vec<_>>());
}

#[test]
fn test_add_file_collisions() {
    let temp_dir = TempDir::new().unwrap();
    let mut rec = create_recording(&temp_dir, "a.wiff");

    rec.add_file("b.wiff").unwrap();
    assert!(matches!(rec.add_file("b.wiff"), Err(WiffError::AlreadyExists(_))));

    std::fs::write(temp_dir.path().join("c.wiff"), b"occupied").unwrap();
    assert!(matches!(rec.add_file("c.wiff"), Err(WiffError::AlreadyExists(_))));
    assert_eq!(rec.num_files().unwrap(), 2);

    assert_eq!(rec.set_file("a.wiff").unwrap(), 0);
    assert!(matches!(rec.set_file("zzz.wiff"), Err(WiffError::NotFound(_))));
}

#[test]
fn test_annotation_filtering() {
    let temp_dir = TempDir::new().unwrap();
    let mut rec = create_recording(&temp_dir, "anno.wiff");

    rec.new_annotations(Compression::None).unwrap();
    for a in sample_annotations() {
        rec.add_annotation(&a).unwrap();
    }

    let markers = rec
        .annotations(&AnnotationQuery::all().kind(AnnotationKind::Marker))
        .unwrap();
    assert_eq!(markers.len(), 1);

    let at_25 = rec.annotations(&AnnotationQuery::all().frame(25)).unwrap();
    assert_eq!(at_25.len(), 1);
    assert_eq!(at_25[0].1, sample_annotations()[0]);

    assert!(rec
        .annotations(&AnnotationQuery::all().frame(200))
        .unwrap()
        .is_empty());

    let files = rec.files().unwrap();
    assert_eq!((files[0].aidx_start, files[0].aidx_end), (0, 3));
    assert_eq!(rec.num_annotations().unwrap(), 3);
}

#[test]
fn test_annotation_block_rollover() {
    let temp_dir = TempDir::new().unwrap();
    let mut rec = create_recording(&temp_dir, "roll.wiff");
    rec.new_annotations(Compression::None).unwrap();

    let text = "y".repeat(2000);
    for i in 0..100u64 {
        let aidx = rec
            .add_annotation(&Annotation::Comment {
                fidx_start: i,
                fidx_end: i,
                text: text.clone(),
            })
            .unwrap();
        assert_eq!(aidx, i);
    }

    let blocks = rec.annotation_blocks().unwrap();
    assert!(blocks.len() > 1);
    assert_eq!(blocks[1].aidx_start, blocks[0].aidx_end);
    assert_eq!(blocks.last().unwrap().aidx_end, 100);

    let hits = rec.annotations(&AnnotationQuery::all().frame(99)).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0, 99);
}

#[test]
fn test_too_many_channels_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("wide.wiff");

    let mut config = create_test_config();
    config.channels = (0..257)
        .map(|i| ChannelConfig::new(&format!("c{i}"), 8, ""))
        .collect();

    assert!(matches!(
        Recording::create(&path, &config),
        Err(WiffError::ConfigError(_))
    ));
    assert!(!path.exists());
}

#[test]
fn test_create_existing_path() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("dup.wiff");
    Recording::create(&path, &create_test_config()).unwrap();

    assert!(matches!(
        Recording::create(&path, &create_test_config()),
        Err(WiffError::AlreadyExists(_))
    ));
}

#[test]
fn test_reopen_reproduces_everything() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("full.wiff");
    {
        let mut rec = Recording::create(&path, &create_test_config()).unwrap();
        rec.new_segment(&both(), Compression::None, None).unwrap();
        rec.add_frame_values(&[[1u64, 2], [3, 4]]).unwrap();
        rec.new_annotations(Compression::None).unwrap();
        for a in sample_annotations() {
            rec.add_annotation(&a).unwrap();
        }
        rec.add_meta(MetaEntry::new(MetaLevel::Recording, 0, "site", "ward 7"))
            .unwrap();
        rec.add_meta(MetaEntry::new(MetaLevel::Channel, 1, "gain", MetaValue::F64(vec![0.5])))
            .unwrap();
        rec.set_end(&ts("20010203 060000.000000")).unwrap();
        rec.close().unwrap();
    }

    let rec = Recording::open(&path).unwrap();
    assert_eq!(rec.start().unwrap(), ts("20010203 040506.070809"));
    assert_eq!(rec.end().unwrap(), ts("20010203 060000.000000"));
    assert_eq!(rec.description().unwrap(), "integration");
    assert_eq!(rec.fs().unwrap(), 500);

    let channels = rec.channels().unwrap();
    assert_eq!(channels.len(), 2);
    assert_eq!(channels[1].name, "II");
    assert_eq!(channels[1].comment, "lead II");

    assert_eq!(rec.num_frames().unwrap(), 2);
    assert_eq!(rec.get_frame(1).unwrap().samples, vec![(0, 3), (1, 4)]);

    let annotations: Vec<Annotation> = rec
        .annotations(&AnnotationQuery::all())
        .unwrap()
        .into_iter()
        .map(|(_, a)| a)
        .collect();
    assert_eq!(annotations, sample_annotations());

    assert_eq!(rec.num_metas().unwrap(), 2);
    assert_eq!(
        rec.meta(MetaLevel::Recording, 5, "site").unwrap().value,
        MetaValue::from("ward 7")
    );
    assert_eq!(
        rec.meta(MetaLevel::Channel, 1, "gain").unwrap().value,
        MetaValue::F64(vec![0.5])
    );
    assert!(matches!(
        rec.meta(MetaLevel::Channel, 0, "gain"),
        Err(WiffError::NotFound(_))
    ));
}

#[test]
fn test_resume_after_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("resume.wiff");
    {
        let mut rec = Recording::create(&path, &create_test_config()).unwrap();
        rec.new_segment(&both(), Compression::None, None).unwrap();
        rec.add_frame_values(&[[1u64, 1]]).unwrap();
        rec.add_file("resume.1.wiff").unwrap();
        rec.new_segment(&both(), Compression::None, None).unwrap();
        rec.add_frame_values(&[[2u64, 2]]).unwrap();
        rec.new_annotations(Compression::None).unwrap();
        rec.add_annotation(&sample_annotations()[1]).unwrap();
        rec.close().unwrap();
    }

    let mut rec = Recording::open(&path).unwrap();
    assert!(matches!(
        rec.add_frame_values(&[[3u64, 3]]),
        Err(WiffError::NoCursor(_))
    ));

    rec.resume().unwrap();
    assert_eq!(rec.cursor().file, 1);
    assert_eq!(rec.add_frame_values(&[[3u64, 3]]).unwrap(), 3);
    assert_eq!(rec.add_annotation(&sample_annotations()[0]).unwrap(), 1);

    let files = rec.files().unwrap();
    // End raised by the marker at frame 40
    assert_eq!((files[1].fidx_start, files[1].fidx_end), (1, 41));
    assert_eq!((files[1].aidx_start, files[1].aidx_end), (0, 2));
    assert_eq!(rec.segments().unwrap().len(), 2);
    assert_eq!(rec.get_frame(2).unwrap().sample(1), Some(3));
}

#[test]
fn test_duplicate_meta_key() {
    let temp_dir = TempDir::new().unwrap();
    let mut rec = create_recording(&temp_dir, "meta.wiff");

    rec.add_meta(MetaEntry::new(MetaLevel::Frame, 10, "beat", 1_i64))
        .unwrap();
    rec.add_meta(MetaEntry::new(MetaLevel::Frame, 11, "beat", 1_i64))
        .unwrap();

    assert!(matches!(
        rec.add_meta(MetaEntry::new(MetaLevel::Frame, 10, "beat", 2_i64)),
        Err(WiffError::DuplicateMetaKey { level_index: 10, .. })
    ));

    // Recording-level values ignore the index
    rec.add_meta(MetaEntry::new(MetaLevel::Recording, 0, "id", "x"))
        .unwrap();
    assert!(matches!(
        rec.add_meta(MetaEntry {
            level: MetaLevel::Recording,
            level_index: 9,
            key: "id".to_string(),
            value: MetaValue::from("y"),
        }),
        Err(WiffError::DuplicateMetaKey { .. })
    ));

    // Same key in a second file still collides
    rec.add_file("meta.1.wiff").unwrap();
    assert!(matches!(
        rec.add_meta(MetaEntry::new(MetaLevel::Frame, 11, "beat", 3_i64)),
        Err(WiffError::DuplicateMetaKey { .. })
    ));
    assert_eq!(rec.num_metas().unwrap(), 3);
}

#[test]
fn test_fixed_field_overwrite() {
    let temp_dir = TempDir::new().unwrap();
    let mut rec = create_recording(&temp_dir, "fixed.wiff");

    rec.set_description("INTEGRATION").unwrap();
    assert_eq!(rec.description().unwrap(), "INTEGRATION");

    assert!(matches!(
        rec.set_description("short"),
        Err(WiffError::FixedFieldLengthMismatch {
            expected: 11,
            actual: 5,
            ..
        })
    ));
    assert_eq!(rec.description().unwrap(), "INTEGRATION");
}

#[test]
fn test_width_mismatch() {
    let temp_dir = TempDir::new().unwrap();
    let mut rec = create_recording(&temp_dir, "w.wiff");
    rec.new_segment(&both(), Compression::None, None).unwrap();

    assert!(matches!(
        rec.add_frames(&[vec![vec![1u8], vec![2, 0]]]),
        Err(WiffError::ChannelSizeMismatch {
            channel: 0,
            expected: 2,
            actual: 1
        })
    ));
    assert!(matches!(
        rec.add_frame_values(&[[0x1_0005u64, 7]]),
        Err(WiffError::ChannelSizeMismatch {
            channel: 0,
            expected: 2,
            actual: 3
        })
    ));
    assert!(matches!(
        rec.add_frame_values(&[[1u64]]),
        Err(WiffError::ChannelCountMismatch {
            expected: 2,
            actual: 1
        })
    ));
    assert_eq!(rec.num_frames().unwrap(), 0);
}

#[test]
fn test_annotation_keeps_file_frame_start() {
    let temp_dir = TempDir::new().unwrap();
    let mut rec = create_recording(&temp_dir, "a.wiff");

    rec.new_segment(&both(), Compression::None, None).unwrap();
    let frames: Vec<[u64; 2]> = (0..10).map(|i| [i, i]).collect();
    rec.add_frame_values(&frames).unwrap();

    rec.add_file("b.wiff").unwrap();
    rec.new_annotations(Compression::None).unwrap();
    rec.add_annotation(&Annotation::Marker {
        fidx_start: 2,
        fidx_end: 3,
        code: MarkerCode::new("QRS ").unwrap(),
    })
    .unwrap();

    let files = rec.files().unwrap();
    assert_eq!((files[1].fidx_start, files[1].fidx_end), (10, 10));

    rec.new_segment(&both(), Compression::None, None).unwrap();
    rec.add_frame_values(&frames).unwrap();

    let files = rec.files().unwrap();
    assert_eq!((files[0].fidx_start, files[0].fidx_end), (0, 10));
    assert_eq!((files[1].fidx_start, files[1].fidx_end), (10, 20));
    assert_eq!((files[1].aidx_start, files[1].aidx_end), (0, 1));
    assert_eq!(rec.get_frame(5).unwrap().sample(0), Some(5));
    assert_eq!(rec.get_frame(15).unwrap().sample(0), Some(5));

    // The block still records where the marker sits
    let blocks = rec.annotation_blocks().unwrap();
    assert_eq!(blocks[0].bounds, Some(2..=3));
}

#[test]
fn test_annotation_ending_at_max_frame() {
    let temp_dir = TempDir::new().unwrap();
    let mut rec = create_recording(&temp_dir, "max.wiff");
    rec.new_annotations(Compression::None).unwrap();

    let unbounded = Annotation::Marker {
        fidx_start: 5,
        fidx_end: u64::MAX,
        code: MarkerCode::new("QRS ").unwrap(),
    };
    assert!(matches!(rec.add_annotation(&unbounded), Err(WiffError::InvalidAnnotation(_))));

    assert_eq!(rec.num_annotations().unwrap(), 0);
    assert!(rec.annotations(&AnnotationQuery::all()).unwrap().is_empty());
    let files = rec.files().unwrap();
    assert_eq!((files[0].aidx_start, files[0].aidx_end), (0, 0));
}
