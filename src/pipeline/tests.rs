use super::*;
use crate::engine::Reply;
use crate::models::{ErrorKind, Orientation, PixelFormat, PixelRect, RawDetection, Rotation};
use crate::normalize::{NativeFormat, NormalizedImage};
use crate::utils::yuv::yuv420_len;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

#[derive(Clone)]
enum Script {
    Answer(Vec<RawDetection>),
    AnswerTwice(Vec<RawDetection>),
    Fail(&'static str),
    Silent,
    Panic,
}

#[derive(Default)]
struct Recorder {
    processed: AtomicUsize,
    accepted_answers: AtomicUsize,
    closed: AtomicUsize,
    rotation: Mutex<Option<Rotation>>,
    native: Mutex<Option<bool>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Recorder {
    fn join_workers(&self) {
        let workers: Vec<_> = self.workers.lock().unwrap().drain(..).collect();
        for worker in workers {
            worker.join().unwrap();
        }
    }
}

/// Test double answering from its own thread according to a script
struct ScriptedDecoder {
    script: Script,
    native: bool,
    recorder: Arc<Recorder>,
}

impl ScriptedDecoder {
    fn new(script: Script) -> (Self, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let decoder = Self {
            script,
            native: true,
            recorder: recorder.clone(),
        };
        (decoder, recorder)
    }

    fn bitmap_only(mut self) -> Self {
        self.native = false;
        self
    }
}

impl CodeDecoder for ScriptedDecoder {
    fn process(&self, image: NormalizedImage, reply: Reply) {
        let recorder = self.recorder.clone();
        recorder.processed.fetch_add(1, Ordering::SeqCst);
        *recorder.rotation.lock().unwrap() = Some(image.rotation);
        *recorder.native.lock().unwrap() = Some(image.is_native());

        let answers: Vec<Result<Vec<RawDetection>, &'static str>> = match self.script.clone() {
            Script::Answer(detections) => vec![Ok(detections)],
            Script::AnswerTwice(detections) => vec![Ok(detections.clone()), Ok(detections)],
            Script::Fail(message) => vec![Err(message)],
            Script::Silent => return,
            Script::Panic => panic!("engine exploded"),
        };

        let worker_recorder = recorder.clone();
        let worker = std::thread::spawn(move || {
            for answer in answers {
                let accepted = match answer {
                    Ok(detections) => reply.succeed(detections),
                    Err(message) => reply.fail(message),
                };
                if accepted {
                    worker_recorder.accepted_answers.fetch_add(1, Ordering::SeqCst);
                }
            }
        });
        recorder.workers.lock().unwrap().push(worker);
    }

    fn accepts_native(&self, _format: NativeFormat) -> bool {
        self.native
    }

    fn close(&self) {
        self.recorder.closed.fetch_add(1, Ordering::SeqCst);
    }
}

fn nv21_frame_json(width: usize, height: usize, orientation: &str) -> Value {
    json!({
        "width": width,
        "height": height,
        "format": 17,
        "orientation": orientation,
        "data": { "bytes": vec![128u8; yuv420_len(width, height)] }
    })
}

fn nv21_frame(width: u32, height: u32, orientation: Orientation) -> FrameDescriptor {
    FrameDescriptor::new(
        width,
        height,
        PixelFormat::Nv21,
        orientation,
        vec![128u8; yuv420_len(width as usize, height as usize)],
    )
}

fn hello() -> RawDetection {
    RawDetection::new()
        .with_raw_value("HELLO")
        .with_bounding_box(PixelRect::new(10, 20, 100, 50))
}

#[tokio::test]
async fn test_reference_scenario() {
    let (decoder, recorder) = ScriptedDecoder::new(Script::Answer(vec![hello()]));
    let pipeline = Pipeline::new(decoder);

    let frame = nv21_frame_json(640, 480, "portrait");
    let outcome = pipeline.detect(Some(&frame)).await;

    let result = outcome.result().expect("expected a detection");
    assert_eq!(result.value.as_deref(), Some("HELLO"));
    assert_eq!(result.bounds.rect, Some(PixelRect::new(10, 20, 100, 50)));
    let [fx, fy] = result.bounds.origin.unwrap();
    let [fw, fh] = result.bounds.size.unwrap();
    assert!((fx - 0.0156).abs() < 1e-4);
    assert!((fy - 0.0417).abs() < 1e-4);
    assert!((fw - 0.1563).abs() < 1e-4);
    assert!((fh - 0.1042).abs() < 1e-4);

    assert_eq!(*recorder.rotation.lock().unwrap(), Some(Rotation::Deg0));
    assert_eq!(*recorder.native.lock().unwrap(), Some(true));
}

#[tokio::test]
async fn test_duplicate_success_resolves_once() {
    let (decoder, recorder) = ScriptedDecoder::new(Script::AnswerTwice(vec![hello()]));
    let pipeline = Pipeline::new(decoder);

    let outcome = pipeline
        .detect_frame(nv21_frame(64, 48, Orientation::Portrait))
        .await;
    recorder.join_workers();

    assert!(outcome.is_success());
    assert_eq!(recorder.accepted_answers.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_null_frame_skips_extraction() {
    let (decoder, recorder) = ScriptedDecoder::new(Script::Answer(vec![hello()]));
    let pipeline = Pipeline::new(decoder);

    let outcome = pipeline.detect(None).await;
    assert_eq!(outcome.error_kind(), Some(ErrorKind::InvalidFrame));
    let outcome = pipeline.detect(Some(&Value::Null)).await;
    assert_eq!(outcome.error_kind(), Some(ErrorKind::InvalidFrame));
    assert_eq!(recorder.processed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_payload() {
    let (decoder, recorder) = ScriptedDecoder::new(Script::Answer(vec![hello()]));
    let pipeline = Pipeline::new(decoder);

    let frame = json!({ "width": 640, "height": 480, "format": 17, "orientation": "portrait" });
    let outcome = pipeline.detect(Some(&frame)).await;
    assert_eq!(outcome.error_kind(), Some(ErrorKind::InvalidData));
    assert_eq!(recorder.processed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_nothing_found_is_success() {
    let (decoder, _recorder) = ScriptedDecoder::new(Script::Answer(Vec::new()));
    let pipeline = Pipeline::new(decoder);

    let outcome = pipeline
        .detect_frame(nv21_frame(32, 32, Orientation::Portrait))
        .await;
    assert_eq!(outcome, Outcome::not_found());
}

#[tokio::test]
async fn test_unsupported_format_garbage() {
    let (decoder, recorder) = ScriptedDecoder::new(Script::Answer(vec![hello()]));
    let pipeline = Pipeline::new(decoder);

    let frame = json!({
        "width": 4, "height": 4, "format": 842094169, "buffer": [1, 2, 3, 4, 5, 6]
    });
    let outcome = pipeline.detect(Some(&frame)).await;
    assert_eq!(outcome.error_kind(), Some(ErrorKind::ConversionError));
    assert_eq!(recorder.processed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_decoder_failure() {
    let (decoder, _recorder) = ScriptedDecoder::new(Script::Fail("model not loaded"));
    let pipeline = Pipeline::new(decoder);

    let outcome = pipeline
        .detect_frame(nv21_frame(32, 32, Orientation::Portrait))
        .await;
    match outcome {
        Outcome::Failure { code, message } => {
            assert_eq!(code, ErrorKind::DetectionError);
            assert!(message.contains("model not loaded"), "{}", message);
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_silent_decoder_does_not_hang() {
    let (decoder, _recorder) = ScriptedDecoder::new(Script::Silent);
    let pipeline = Pipeline::new(decoder);

    let outcome = pipeline
        .detect_frame(nv21_frame(16, 16, Orientation::Portrait))
        .await;
    assert_eq!(outcome.error_kind(), Some(ErrorKind::DetectionError));
}

#[tokio::test]
async fn test_panicking_decoder_is_contained() {
    let (decoder, _recorder) = ScriptedDecoder::new(Script::Panic);
    let pipeline = Pipeline::new(decoder);

    let outcome = pipeline
        .detect_frame(nv21_frame(16, 16, Orientation::Portrait))
        .await;
    assert_eq!(outcome.error_kind(), Some(ErrorKind::DetectionError));

    // The pipeline stays usable afterwards
    let outcome = pipeline.detect(None).await;
    assert_eq!(outcome.error_kind(), Some(ErrorKind::InvalidFrame));
}

struct BrokenFormatDecoder;

impl CodeDecoder for BrokenFormatDecoder {
    fn process(&self, _image: NormalizedImage, reply: Reply) {
        reply.succeed(Vec::new());
    }

    fn accepts_native(&self, _format: NativeFormat) -> bool {
        panic!("format table corrupted");
    }
}

#[tokio::test]
async fn test_panic_during_normalization_is_contained() {
    let pipeline = Pipeline::new(BrokenFormatDecoder);

    let outcome = pipeline
        .detect(Some(&nv21_frame_json(16, 16, "portrait")))
        .await;
    assert_eq!(outcome.error_kind(), Some(ErrorKind::DetectionError));
    match outcome {
        Outcome::Failure { message, .. } => {
            assert!(message.contains("format table corrupted"), "{}", message)
        }
        Outcome::Success { .. } => panic!("expected failure"),
    }

    let outcome = pipeline.detect(None).await;
    assert_eq!(outcome.error_kind(), Some(ErrorKind::InvalidFrame));
}

#[tokio::test]
async fn test_first_detection_wins() {
    let second = RawDetection::new().with_raw_value("SECOND");
    let (decoder, _recorder) = ScriptedDecoder::new(Script::Answer(vec![hello(), second]));
    let pipeline = Pipeline::new(decoder);

    let outcome = pipeline
        .detect_frame(nv21_frame(640, 480, Orientation::Portrait))
        .await;
    assert_eq!(outcome.result().unwrap().value.as_deref(), Some("HELLO"));
}

#[tokio::test]
async fn test_rotation_and_fallback_reach_decoder() {
    let (decoder, recorder) = ScriptedDecoder::new(Script::Answer(Vec::new()));
    let pipeline = Pipeline::new(decoder.bitmap_only());

    let frame = nv21_frame_json(48, 32, "landscapeRight");
    let outcome = pipeline.detect(Some(&frame)).await;
    assert!(outcome.is_success());
    assert_eq!(*recorder.rotation.lock().unwrap(), Some(Rotation::Deg270));
    assert_eq!(*recorder.native.lock().unwrap(), Some(false));
}

#[tokio::test]
async fn test_fractions_use_original_frame_size() {
    // A decoder working on a rotated image may report boxes past the frame; they are clipped
    let wide = RawDetection::new()
        .with_raw_value("EDGE")
        .with_bounding_box(PixelRect::new(400, 300, 200, 400));
    let (decoder, _recorder) = ScriptedDecoder::new(Script::Answer(vec![wide]));
    let pipeline = Pipeline::new(decoder);

    let outcome = pipeline
        .detect_frame(nv21_frame(640, 480, Orientation::LandscapeLeft))
        .await;
    let bounds = &outcome.result().unwrap().bounds;
    assert_eq!(bounds.rect, Some(PixelRect::new(400, 300, 200, 180)));
    let [_, fy] = bounds.origin.unwrap();
    let [_, fh] = bounds.size.unwrap();
    assert!((fy + fh - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let (decoder, recorder) = ScriptedDecoder::new(Script::Answer(vec![hello()]));
    let pipeline = Pipeline::new(decoder);

    assert!(pipeline.close());
    assert!(!pipeline.close());
    assert!(pipeline.is_closed());

    let outcome = pipeline
        .detect_frame(nv21_frame(16, 16, Orientation::Portrait))
        .await;
    assert_eq!(outcome.error_kind(), Some(ErrorKind::DetectorClosed));
    assert_eq!(recorder.processed.load(Ordering::SeqCst), 0);

    drop(pipeline);
    assert_eq!(recorder.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_drop_releases_decoder() {
    let (decoder, recorder) = ScriptedDecoder::new(Script::Answer(Vec::new()));
    drop(Pipeline::new(decoder));
    assert_eq!(recorder.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_invocations() {
    let (decoder, recorder) = ScriptedDecoder::new(Script::Answer(vec![hello()]));
    let pipeline = Arc::new(Pipeline::new(decoder));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let pipeline = pipeline.clone();
        tasks.push(tokio::spawn(async move {
            pipeline
                .detect_frame(nv21_frame(640, 480, Orientation::Portrait))
                .await
        }));
    }
    for task in tasks {
        let outcome = task.await.unwrap();
        assert_eq!(outcome.result().unwrap().value.as_deref(), Some("HELLO"));
    }
    assert_eq!(recorder.processed.load(Ordering::SeqCst), 8);
}
