use matte_stream::matting::PLACEHOLDER_SHAPE;
use matte_stream::{FramePixels, MattingError, MattingPipeline, PipelineConfig, StubBackend};

fn config() -> PipelineConfig {
    PipelineConfig {
        input_width: 16,
        input_height: 16,
        downsample_ratio: 0.5,
    }
}

fn gradient_frame(width: u32, height: u32) -> FramePixels {
    let data = (0..height)
        .flat_map(|y| (0..width).flat_map(move |x| [(x * 10) as u8, (y * 10) as u8, 128]))
        .collect();
    FramePixels::new(width, height, 3, data).unwrap()
}

fn recorded_state_inputs(backend: &StubBackend, call: usize) -> Vec<(Vec<usize>, Vec<f32>)> {
    let recorded = &backend.recorded()[call];
    ["r1i", "r2i", "r3i", "r4i"]
        .iter()
        .map(|name| {
            let tensor = recorded.input(name).expect("state input recorded");
            (tensor.shape().to_vec(), tensor.data().to_vec())
        })
        .collect()
}

#[test]
fn test_first_frame_sends_placeholder_state() {
    let mut pipeline = MattingPipeline::new(StubBackend::new().recording(), &config()).unwrap();

    pipeline.process_frame(&gradient_frame(16, 16)).unwrap();

    for (shape, data) in recorded_state_inputs(pipeline.backend(), 0) {
        assert_eq!(shape, PLACEHOLDER_SHAPE.to_vec());
        assert_eq!(data, vec![0.0]);
    }
}

#[test]
fn test_state_flows_from_outputs_to_next_inputs() {
    let mut pipeline = MattingPipeline::new(StubBackend::new().recording(), &config()).unwrap();

    pipeline.process_frame(&gradient_frame(16, 16)).unwrap();
    pipeline.process_frame(&gradient_frame(16, 16)).unwrap();

    // Call 1 emits `1 + layer / 10` at 8x8 (16 * 0.5), halving per layer
    let second = recorded_state_inputs(pipeline.backend(), 1);
    assert_eq!(second[0].0, vec![1, 16, 8, 8]);
    assert_eq!(second[3].0, vec![1, 64, 1, 1]);
    for (layer, (_, data)) in second.iter().enumerate() {
        let expected = 1.0 + layer as f32 / 10.0;
        assert!(
            data.iter().all(|&v| v == expected),
            "Layer {layer} should carry the previous call's output"
        );
    }
}

#[test]
fn test_state_survives_backend_releasing_buffers() {
    let mut pipeline = MattingPipeline::new(StubBackend::new(), &config()).unwrap();

    pipeline.process_frame(&gradient_frame(16, 16)).unwrap();

    assert!(
        pipeline.backend().outputs_released(),
        "Stub zeroes its outputs once the pipeline is done with them"
    );
    for (layer, tensor) in pipeline.state().layers().iter().enumerate() {
        let expected = 1.0 + layer as f32 / 10.0;
        assert!(tensor.data().iter().all(|&v| v == expected));
        assert_eq!(tensor.len(), tensor.shape().iter().product::<usize>());
    }
}

#[test]
fn test_reset_sends_placeholder_on_next_frame() {
    let mut pipeline = MattingPipeline::new(StubBackend::new().recording(), &config()).unwrap();

    for _ in 0..5 {
        pipeline.process_frame(&gradient_frame(16, 16)).unwrap();
    }
    pipeline.reset();
    pipeline.process_frame(&gradient_frame(16, 16)).unwrap();

    for (shape, data) in recorded_state_inputs(pipeline.backend(), 5) {
        assert_eq!(shape, vec![1, 1, 1, 1]);
        assert_eq!(data, vec![0.0]);
    }
    assert_eq!(pipeline.frames_processed(), 6, "Reset does not rewind the frame counter");
}

#[test]
fn test_ratio_change_keeps_state_and_reaches_backend() {
    let mut pipeline = MattingPipeline::new(StubBackend::new().recording(), &config()).unwrap();

    pipeline.process_frame(&gradient_frame(16, 16)).unwrap();
    pipeline.set_downsample_ratio(0.25);
    pipeline.process_frame(&gradient_frame(16, 16)).unwrap();
    pipeline.process_frame(&gradient_frame(16, 16)).unwrap();

    let backend = pipeline.backend();
    let ratio = backend.recorded()[1].input("downsample_ratio").unwrap();
    assert_eq!(ratio.shape(), &[1]);
    assert_eq!(ratio.data(), &[0.25]);

    // Frame 2 still sees frame 1's 8x8 state; frame 3 sees the new 4x4 one
    assert_eq!(recorded_state_inputs(backend, 1)[0].0, vec![1, 16, 8, 8]);
    assert_eq!(recorded_state_inputs(backend, 2)[0].0, vec![1, 16, 4, 4]);
}

#[test]
fn test_failed_inference_keeps_previous_result_and_state() {
    let mut pipeline = MattingPipeline::new(StubBackend::new().recording(), &config()).unwrap();
    pipeline.backend_mut().set_fail_on_call(Some(2));

    let first = pipeline.process_frame(&gradient_frame(16, 16)).unwrap().clone();
    let state_before = pipeline.state().clone();

    let failed = pipeline.process_frame(&FramePixels::new(16, 16, 3, vec![0; 768]).unwrap());

    match failed {
        Err(MattingError::Inference(err)) => {
            assert!(err.to_string().contains("stub failure on call 2"));
        }
        other => panic!("expected an inference error, got {other:?}"),
    }
    assert_eq!(pipeline.last_result(), Some(&first));
    assert_eq!(pipeline.state(), &state_before);
    assert_eq!(pipeline.frames_processed(), 1);

    // The next frame continues from frame 1's state
    pipeline.process_frame(&gradient_frame(16, 16)).unwrap();
    let third = recorded_state_inputs(pipeline.backend(), 2);
    assert!(third[0].1.iter().all(|&v| v == 1.0));
}

#[test]
fn test_missing_recurrent_output_leaves_state_unchanged() {
    let mut pipeline = MattingPipeline::new(StubBackend::new(), &config()).unwrap();
    pipeline.process_frame(&gradient_frame(16, 16)).unwrap();
    let state_before = pipeline.state().clone();
    let result_before = pipeline.last_result().cloned();

    pipeline.backend_mut().set_omitted(&["r3o"]);
    let result = pipeline.process_frame(&gradient_frame(16, 16));

    assert!(matches!(result, Err(MattingError::MissingStateOutput("r3o"))));
    assert_eq!(pipeline.state(), &state_before);
    assert_eq!(pipeline.last_result().cloned(), result_before);
}

#[test]
fn test_identity_model_reproduces_input() {
    let mut pipeline = MattingPipeline::new(StubBackend::new(), &config()).unwrap();
    let input = gradient_frame(16, 16);

    let result = pipeline.process_frame(&input).unwrap();

    for (a, b) in input.data.iter().zip(&result.foreground.data) {
        assert!(a.abs_diff(*b) <= 2, "{a} vs {b}");
    }
    assert!(result.alpha.data.iter().all(|&a| a == 255));
    for (i, px) in result.composite.data.chunks_exact(4).enumerate() {
        assert_eq!(&px[..3], &result.foreground.data[i * 3..i * 3 + 3]);
        assert_eq!(px[3], result.alpha.data[i]);
    }
}

#[test]
fn test_last_result_accessors_agree() {
    let mut pipeline = MattingPipeline::new(StubBackend::new(), &config()).unwrap();
    assert!(pipeline.last_composite().is_none());

    pipeline.process_frame(&gradient_frame(10, 6)).unwrap();

    let result = pipeline.last_result().unwrap();
    assert_eq!(pipeline.last_foreground(), Some(&result.foreground));
    assert_eq!(pipeline.last_alpha(), Some(&result.alpha));
    assert_eq!(pipeline.last_composite(), Some(&result.composite));
    assert_eq!(result.composite.dimensions(), (10, 6));
}

#[test]
fn test_independent_pipelines_do_not_share_state() {
    let mut a = MattingPipeline::new(StubBackend::new(), &config()).unwrap();
    let b = MattingPipeline::new(StubBackend::new(), &config()).unwrap();

    a.process_frame(&gradient_frame(16, 16)).unwrap();

    assert!(!a.state().is_placeholder());
    assert!(b.state().is_placeholder());
}
