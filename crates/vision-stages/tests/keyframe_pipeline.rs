use frame_pipeline_core::{
    ConfigTree, Frame, FrameBuffer, Pipeline, StageRegistry, Tag, TerminateFlag,
    DEFAULT_OUTPUT_KEY,
};
use frame_pipeline_stages::{keys, register_all_stages};
use image::{DynamicImage, GrayImage, Luma};
use ndarray::Array2;
use tempfile::tempdir;

const TOPOLOGY: &str = r#"
- GreyscaleConvertStage
- ImageHistogramStage
- TrackFeaturesStage
- ProcessTracksStage
- ClassRegionStage
- WriteTagsStage
- Parallel:
    - NormaliseImageStage
    - GradientImageStage
"#;

/// Bright square on a dark background, or the inverse
fn scene(offset: u32, inverted: bool) -> DynamicImage {
    let (fg, bg) = if inverted { (20, 220) } else { (220, 20) };
    DynamicImage::ImageLuma8(GrayImage::from_fn(40, 40, |x, y| {
        let inside = (10 + offset..20 + offset).contains(&x) && (12..22).contains(&y);
        Luma([if inside { fg } else { bg }])
    }))
}

#[test]
fn test_keyframes_are_tagged_and_written() {
    let dir = tempdir().unwrap();
    let tags_path = dir.path().join("tags.json");

    let mut registry = StageRegistry::new();
    register_all_stages(&mut registry);
    let topology = ConfigTree::from_yaml_str(TOPOLOGY).unwrap();
    let settings = ConfigTree::from_json_str(
        &serde_json::json!({
            "WriteTagsStage": { "path": tags_path.to_string_lossy() },
            "ImageHistogramStage": { "bins": 32 },
        })
        .to_string(),
    )
    .unwrap();

    let mut pipeline = Pipeline::new(&registry, &topology, &settings);
    assert_eq!(pipeline.sub_pipelines().len(), 2);
    assert_eq!(pipeline.sub_pipelines()[0].len(), 6);
    assert_eq!(
        pipeline.sub_pipelines()[1].stage_names(),
        vec!["NormaliseImageStage", "GradientImageStage"]
    );

    let buffer = FrameBuffer::new(8);
    let scenes = [
        scene(0, false),
        scene(1, false),
        scene(2, false),
        scene(0, true),
        scene(0, false),
    ];
    for (number, image) in scenes.into_iter().enumerate() {
        assert!(!buffer.push(Frame::new(number as u64, image)), "no frame evicted");
    }

    let terminate = TerminateFlag::new();
    terminate.request();
    pipeline.register_source_buffer(&buffer);
    let stats = pipeline.try_run(Some(&terminate), DEFAULT_OUTPUT_KEY).unwrap();

    assert_eq!(stats.frames_processed, 5);
    assert_eq!(stats.chains_stopped, 2);
    assert_eq!(stats.frames_dropped, 0);

    let tray = pipeline.tray();
    let keyframes: Vec<u64> = tray
        .history::<u64>(keys::KEYFRAMES)
        .unwrap()
        .unwrap()
        .iter()
        .copied()
        .collect();
    assert_eq!(keyframes, vec![0, 3, 4]);

    let expected: Vec<(u64, usize)> = vec![(0, 0), (3, 1), (4, 0)];
    let tags = tray.get::<Vec<Tag>>(keys::TAGS).unwrap().unwrap();
    let classes: Vec<(u64, usize)> = tags.iter().map(|t| (t.frame_number, t.frame_class)).collect();
    assert_eq!(classes, expected);

    let written: Vec<Tag> =
        serde_json::from_str(&std::fs::read_to_string(&tags_path).unwrap()).unwrap();
    assert_eq!(written, tags);

    // The parallel chain ran on every frame, including the skipped ones
    let normalised = tray.get_ref::<Array2<f32>>(keys::NORMALISED).unwrap().unwrap();
    assert_eq!(normalised.dim(), (40, 40));
    assert!(tray.contains(keys::GRADIENT));
    assert_eq!(tray.history::<Vec<f32>>(keys::HISTOGRAMS).unwrap().unwrap().len(), 5);
}

#[test]
fn test_stage_failure_stops_the_run() {
    let mut registry = StageRegistry::new();
    register_all_stages(&mut registry);
    // ClassRegionStage needs a histogram the topology never produces
    let topology = ConfigTree::from_yaml_str(
        "- GreyscaleConvertStage\n- TrackFeaturesStage\n- ProcessTracksStage\n- ClassRegionStage\n",
    )
    .unwrap();

    let mut pipeline = Pipeline::new(&registry, &topology, &ConfigTree::new());
    let buffer = FrameBuffer::new(4);
    buffer.push(Frame::new(0, scene(0, false)));
    buffer.push(Frame::new(1, scene(1, false)));

    let terminate = TerminateFlag::new();
    terminate.request();
    pipeline.register_source_buffer(&buffer);

    assert!(!pipeline.run(Some(&terminate), DEFAULT_OUTPUT_KEY));
    assert_eq!(buffer.len(), 1);
}
