//! Live-edited request for realtime generation.

use crate::request::GenerationRequest;
use easel_engine::{random_seed, MediaInput, PromptOptions, SchedulerOptions};
use parking_lot::Mutex;

#[derive(Debug, Default, Clone, Copy)]
struct DirtyFlags {
    prompt: bool,
    scheduler: bool,
    input: bool,
}

impl DirtyFlags {
    fn all() -> Self {
        Self {
            prompt: true,
            scheduler: true,
            input: true,
        }
    }

    fn any(&self) -> bool {
        self.prompt || self.scheduler || self.input
    }
}

struct SessionState {
    request: GenerationRequest,
    dirty: DirtyFlags,
    /// Seed substituted for a scheduler seed of 0; drawn once per session
    assigned_seed: Option<u32>,
}

/// A request the caller keeps editing while realtime generation runs.
///
/// Every edit raises a dirty flag; the realtime loop only regenerates when a
/// flag is set (or before the first frame). A fresh session starts dirty.
pub struct RealtimeSession {
    state: Mutex<SessionState>,
}

impl RealtimeSession {
    pub fn new(request: GenerationRequest) -> Self {
        Self {
            state: Mutex::new(SessionState {
                request,
                dirty: DirtyFlags::all(),
                assigned_seed: None,
            }),
        }
    }

    pub fn update_prompt(&self, update: impl FnOnce(&mut PromptOptions)) {
        let mut state = self.state.lock();
        update(&mut state.request.prompt);
        state.dirty.prompt = true;
    }

    pub fn update_scheduler(&self, update: impl FnOnce(&mut SchedulerOptions)) {
        let mut state = self.state.lock();
        update(&mut state.request.scheduler);
        state.dirty.scheduler = true;
    }

    /// Replace the source media (canvas, input frame)
    pub fn set_input(&self, input: Option<MediaInput>) {
        let mut state = self.state.lock();
        state.request.prompt.input = input;
        state.dirty.input = true;
    }

    pub fn set_control(&self, control: Option<MediaInput>) {
        let mut state = self.state.lock();
        state.request.prompt.control = control;
        state.dirty.input = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty.any()
    }

    /// Copy of the current request, seed unresolved
    pub fn request(&self) -> GenerationRequest {
        self.state.lock().request.clone()
    }

    /// The request to generate next, or `None` when nothing changed since the
    /// last frame. Clears the dirty flags and resolves a zero seed.
    pub(crate) fn next_request(&self) -> Option<GenerationRequest> {
        let mut state = self.state.lock();
        if !state.dirty.any() && state.assigned_seed.is_some() {
            return None;
        }

        let seed = match state.assigned_seed {
            Some(seed) => seed,
            None => {
                let seed = match state.request.scheduler.seed {
                    0 => random_seed(),
                    seed => seed,
                };
                state.assigned_seed = Some(seed);
                seed
            }
        };
        state.dirty = DirtyFlags::default();

        let mut request = state.request.clone();
        if request.scheduler.seed == 0 {
            request.scheduler.seed = seed;
        }
        Some(request)
    }
}
