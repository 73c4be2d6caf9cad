use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use kuchiki::NodeRef;
use tokio::sync::watch;

use crate::dom;
use crate::error::PrintError;

pub type SurfaceId = u64;

const BLANK_PAGE: &str = "<!DOCTYPE html><html><head></head><body></body></html>";
const OFFSCREEN_LEFT: &str = "-9999px";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfacePurpose {
    Preview,
    Print,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Positioning {
    Static,
    Absolute,
    Fixed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub position: Positioning,
    pub left: Option<String>,
    pub right: Option<String>,
    pub bottom: Option<String>,
    pub width: f32,
    pub height: f32,
}

impl Placement {
    pub fn offscreen() -> Self {
        Self {
            position: Positioning::Absolute,
            left: Some(OFFSCREEN_LEFT.to_string()),
            right: None,
            bottom: None,
            width: 0.0,
            height: 0.0,
        }
    }

    pub fn edge_pinned() -> Self {
        Self {
            position: Positioning::Fixed,
            left: None,
            right: Some("0".to_string()),
            bottom: Some("0".to_string()),
            width: 0.0,
            height: 0.0,
        }
    }

    pub fn visible(width: f32, height: f32) -> Self {
        Self {
            position: Positioning::Static,
            left: None,
            right: None,
            bottom: None,
            width,
            height,
        }
    }

    /// Geometry typical of a leftover print or preview frame.
    pub fn looks_print_related(&self) -> bool {
        let zero_width = self.width == 0.0;
        let zero_height = self.height == 0.0;
        (zero_width && zero_height)
            || (self.position == Positioning::Absolute
                && self.left.as_deref() == Some(OFFSCREEN_LEFT))
            || (self.position == Positioning::Fixed && (zero_width || zero_height))
    }
}

struct Frame {
    placement: Placement,
    purpose: Option<SurfacePurpose>,
    document: Option<NodeRef>,
    accessible: bool,
    loaded: watch::Sender<bool>,
}

struct RegistryState {
    next_id: SurfaceId,
    frames: BTreeMap<SurfaceId, Frame>,
    auto_complete_loads: bool,
}

/// The frames currently attached to the host document, including frames the
/// host created on its own. Cloning shares the registry.
#[derive(Clone)]
pub struct SurfaceRegistry {
    inner: Rc<RefCell<RegistryState>>,
}

impl Default for SurfaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SurfaceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceRegistry")
            .field("frames", &self.ids())
            .finish()
    }
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(RegistryState {
                next_id: 1,
                frames: BTreeMap::new(),
                auto_complete_loads: true,
            })),
        }
    }

    /// When disabled, navigations stay pending until [`Self::complete_load`].
    pub fn set_auto_complete_loads(&self, enabled: bool) {
        self.inner.borrow_mut().auto_complete_loads = enabled;
    }

    fn attach(
        &self,
        placement: Placement,
        purpose: Option<SurfacePurpose>,
        document: Option<NodeRef>,
        accessible: bool,
    ) -> SurfaceId {
        let mut state = self.inner.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;
        let (loaded, _) = watch::channel(document.is_some());
        state.frames.insert(
            id,
            Frame {
                placement,
                purpose,
                document,
                accessible,
                loaded,
            },
        );
        id
    }

    pub fn attach_external(&self, placement: Placement, accessible: bool) -> SurfaceId {
        let document = accessible.then(|| dom::parse_document(BLANK_PAGE));
        self.attach(placement, None, document, accessible)
    }

    pub fn contains(&self, id: SurfaceId) -> bool {
        self.inner.borrow().frames.contains_key(&id)
    }

    pub fn ids(&self) -> Vec<SurfaceId> {
        self.inner.borrow().frames.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().frames.is_empty()
    }

    pub fn surfaces_of(&self, purpose: SurfacePurpose) -> Vec<SurfaceId> {
        self.inner
            .borrow()
            .frames
            .iter()
            .filter(|(_, frame)| frame.purpose == Some(purpose))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn placement(&self, id: SurfaceId) -> Option<Placement> {
        self.inner
            .borrow()
            .frames
            .get(&id)
            .map(|frame| frame.placement.clone())
    }

    pub fn document(&self, id: SurfaceId) -> Result<NodeRef, PrintError> {
        let state = self.inner.borrow();
        let frame = state
            .frames
            .get(&id)
            .ok_or_else(|| PrintError::SurfaceUnavailable(format!("surface {id} is detached")))?;
        if !frame.accessible {
            return Err(PrintError::SurfaceUnavailable(format!(
                "surface {id} document is not accessible"
            )));
        }
        frame
            .document
            .clone()
            .ok_or_else(|| PrintError::SurfaceUnavailable(format!("surface {id} has not loaded")))
    }

    fn begin_navigation(&self, id: SurfaceId) -> Result<watch::Receiver<bool>, PrintError> {
        let mut state = self.inner.borrow_mut();
        let frame = state
            .frames
            .get_mut(&id)
            .ok_or_else(|| PrintError::SurfaceLoad(format!("surface {id} is detached")))?;
        frame.document = None;
        frame.loaded.send_replace(false);
        Ok(frame.loaded.subscribe())
    }

    pub fn complete_load(&self, id: SurfaceId) -> bool {
        let mut state = self.inner.borrow_mut();
        let Some(frame) = state.frames.get_mut(&id) else {
            return false;
        };
        if frame.accessible {
            frame.document = Some(dom::parse_document(BLANK_PAGE));
        }
        frame.loaded.send_replace(true);
        true
    }

    pub fn teardown(&self, id: SurfaceId) -> bool {
        let removed = self.inner.borrow_mut().frames.remove(&id);
        let Some(frame) = removed else {
            return false;
        };
        if let Some(body) = frame
            .document
            .filter(|_| frame.accessible)
            .and_then(|doc| dom::select_first(&doc, "body"))
        {
            dom::clear_children(&body);
        }
        true
    }

    /// Tears the frame down after `delay` on the current local task set.
    /// Panics outside a `LocalSet`.
    pub fn schedule_teardown(&self, id: SurfaceId, delay: Duration) -> tokio::task::JoinHandle<()> {
        let registry = self.clone();
        tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            if registry.teardown(id) {
                log::debug!("tore down surface {id} after {}ms", delay.as_millis());
            }
        })
    }

    /// Removes every frame that looks like a leftover print or preview frame,
    /// or whose document cannot be reached. Returns how many were removed.
    pub fn sweep_stray_surfaces(&self) -> usize {
        let stray: Vec<SurfaceId> = self
            .inner
            .borrow()
            .frames
            .iter()
            .filter(|(_, frame)| !frame.accessible || frame.placement.looks_print_related())
            .map(|(id, _)| *id)
            .collect();
        stray.into_iter().filter(|id| self.teardown(*id)).count()
    }

    fn create_surface(&self, purpose: SurfacePurpose) -> SandboxSurface {
        let placement = match purpose {
            SurfacePurpose::Preview => Placement::offscreen(),
            SurfacePurpose::Print => Placement::edge_pinned(),
        };
        let id = self.attach(placement, Some(purpose), None, true);
        SandboxSurface {
            id,
            purpose,
            registry: self.clone(),
        }
    }

    pub fn create_preview_surface(&self) -> SandboxSurface {
        self.create_surface(SurfacePurpose::Preview)
    }

    pub fn create_print_surface(&self) -> SandboxSurface {
        self.create_surface(SurfacePurpose::Print)
    }

    fn completes_loads(&self) -> bool {
        self.inner.borrow().auto_complete_loads
    }
}

#[derive(Debug, Clone)]
pub struct SandboxSurface {
    id: SurfaceId,
    purpose: SurfacePurpose,
    registry: SurfaceRegistry,
}

impl SandboxSurface {
    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn purpose(&self) -> SurfacePurpose {
        self.purpose
    }

    pub fn is_attached(&self) -> bool {
        self.registry.contains(self.id)
    }

    pub fn document(&self) -> Result<NodeRef, PrintError> {
        self.registry.document(self.id)
    }

    pub fn head(&self) -> Result<NodeRef, PrintError> {
        let document = self.document()?;
        dom::select_first(&document, "head")
            .ok_or_else(|| PrintError::SurfaceUnavailable(format!("surface {} has no head", self.id)))
    }

    pub fn body(&self) -> Result<NodeRef, PrintError> {
        let document = self.document()?;
        dom::select_first(&document, "body")
            .ok_or_else(|| PrintError::SurfaceUnavailable(format!("surface {} has no body", self.id)))
    }

    pub fn teardown(&self) -> bool {
        self.registry.teardown(self.id)
    }

    pub fn schedule_teardown(&self, delay: Duration) -> tokio::task::JoinHandle<()> {
        self.registry.schedule_teardown(self.id, delay)
    }
}

pub async fn await_load(surface: &SandboxSurface) -> Result<(), PrintError> {
    let mut loaded = surface.registry.begin_navigation(surface.id)?;
    if surface.registry.completes_loads() {
        tokio::task::yield_now().await;
        surface.registry.complete_load(surface.id);
    }
    loaded
        .wait_for(|done| *done)
        .await
        .map_err(|_| PrintError::SurfaceLoad(format!("surface {} detached while loading", surface.id)))?;
    Ok(())
}
