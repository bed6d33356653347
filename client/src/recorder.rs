use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Array, Function, Promise};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    Blob, BlobEvent, BlobPropertyBag, MediaRecorder, MediaStream, MediaStreamConstraints,
    MediaStreamTrack,
};

const AUDIO_MIME: &str = "audio/webm";

struct Recording {
    recorder: MediaRecorder,
    stream: MediaStream,
    chunks: Rc<RefCell<Vec<Blob>>>,
    _on_data: Closure<dyn Fn(BlobEvent)>,
}

impl Recording {
    fn release(&self) {
        self.recorder.set_ondataavailable(None);
        self.recorder.set_onstop(None);
        for track in self.stream.get_tracks().iter() {
            if let Ok(track) = track.dyn_into::<MediaStreamTrack>() {
                track.stop();
            }
        }
    }
}

thread_local! {
    static RECORDING: RefCell<Option<Recording>> = const { RefCell::new(None) };
}

/// Ask for the microphone and start capturing. A denied prompt is an `Err`
/// the caller reports; the form keeps working without audio.
pub(crate) async fn start() -> Result<(), String> {
    cancel();
    let window = web_sys::window().ok_or("no window")?;
    let devices = window
        .navigator()
        .media_devices()
        .map_err(|_| "microphone unsupported".to_string())?;
    let constraints = MediaStreamConstraints::new();
    constraints.set_audio(&JsValue::TRUE);
    let promise = devices
        .get_user_media_with_constraints(&constraints)
        .map_err(|e| format!("microphone unavailable: {e:?}"))?;
    let stream: MediaStream = JsFuture::from(promise)
        .await
        .map_err(|e| format!("microphone access denied: {e:?}"))?
        .unchecked_into();

    let recorder = MediaRecorder::new_with_media_stream(&stream)
        .map_err(|e| format!("recorder unavailable: {e:?}"))?;
    let chunks: Rc<RefCell<Vec<Blob>>> = Rc::default();
    let sink = Rc::clone(&chunks);
    let on_data = Closure::<dyn Fn(BlobEvent)>::new(move |e: BlobEvent| {
        if let Some(blob) = e.data() {
            sink.borrow_mut().push(blob);
        }
    });
    recorder.set_ondataavailable(Some(on_data.as_ref().unchecked_ref()));
    recorder
        .start()
        .map_err(|e| format!("recorder failed to start: {e:?}"))?;

    RECORDING.with(|slot| {
        *slot.borrow_mut() = Some(Recording {
            recorder,
            stream,
            chunks,
            _on_data: on_data,
        });
    });
    Ok(())
}

/// Stop capturing and return the clip as one `audio/webm` blob.
pub(crate) async fn stop() -> Result<Blob, String> {
    let Some(recording) = RECORDING.with(|slot| slot.borrow_mut().take()) else {
        return Err("not recording".to_string());
    };

    let stopped = Promise::new(&mut |resolve: Function, _reject: Function| {
        recording.recorder.set_onstop(Some(&resolve));
    });
    if let Err(e) = recording.recorder.stop() {
        recording.release();
        return Err(format!("recorder failed to stop: {e:?}"));
    }
    let waited = JsFuture::from(stopped).await;
    recording.release();
    waited.map_err(|e| format!("recorder failed to stop: {e:?}"))?;

    let parts = recording.chunks.borrow().iter().collect::<Array>();
    let options = BlobPropertyBag::new();
    options.set_type(AUDIO_MIME);
    Blob::new_with_blob_sequence_and_options(&parts, &options)
        .map_err(|e| format!("could not assemble recording: {e:?}"))
}

/// Drop any capture in progress without producing a clip.
pub(crate) fn cancel() {
    RECORDING.with(|slot| {
        if let Some(recording) = slot.borrow_mut().take() {
            let _ = recording.recorder.stop();
            recording.release();
        }
    });
}
