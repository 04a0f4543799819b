/// Represents the resolution of a monitor mode
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct WlResolution {
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
}

impl WlResolution {
    /// Pixel count, widened so two `i32` dimensions cannot overflow
    pub fn area(&self) -> i64 {
        i64::from(self.width) * i64::from(self.height)
    }
}

/// Represents a display mode (resolution + refresh rate) announced for a head
///
/// `M` is the protocol handle of the mode object. The live client uses the
/// `zwlr_output_mode_v1` proxy; anything `Clone + PartialEq` works.
#[derive(Clone, Debug)]
pub struct WlMonitorMode<M> {
    /// Protocol identity of this mode
    pub id: M,
    /// Screen resolution
    pub resolution: WlResolution,
    /// Refresh rate in mHz, as sent by the compositor
    pub refresh: i32,
    /// Whether the compositor marked this as the preferred mode
    pub preferred: bool,
    /// Set once the compositor sent `finished` for this mode
    pub retired: bool,
}

impl<M> WlMonitorMode<M> {
    pub(crate) fn new(id: M) -> Self {
        Self {
            id,
            resolution: WlResolution::default(),
            refresh: 0,
            preferred: false,
            retired: false,
        }
    }

    /// Whether this mode has exactly the given timing
    pub fn matches(&self, width: i32, height: i32, refresh: i32) -> bool {
        self.resolution.width == width
            && self.resolution.height == height
            && self.refresh == refresh
    }
}

/// Represents one output head and the modes it announced
#[derive(Clone, Debug)]
pub struct WlMonitor<H, M> {
    /// Protocol identity of this head
    pub id: H,
    /// Monitor name (e.g., "DP-1", "HDMI-A-1"), absent until announced
    pub name: Option<String>,
    /// Human-readable description of the monitor
    pub description: Option<String>,
    /// Whether the monitor is currently enabled
    pub enabled: bool,
    /// Modes in announcement order
    pub modes: Vec<WlMonitorMode<M>>,
    /// Index into `modes` of the currently active mode
    pub current: Option<usize>,
    /// Set once the compositor sent `finished` for this head
    pub retired: bool,
}

impl<H, M: PartialEq> WlMonitor<H, M> {
    pub(crate) fn new(id: H) -> Self {
        Self {
            id,
            name: None,
            description: None,
            enabled: false,
            modes: Vec::new(),
            current: None,
            retired: false,
        }
    }

    /// Position of the mode with the given identity in this head's own modes
    pub fn mode_index(&self, id: &M) -> Option<usize> {
        self.modes.iter().position(|m| m.id == *id)
    }

    /// The currently active mode, if resolved
    pub fn current_mode(&self) -> Option<&WlMonitorMode<M>> {
        self.current.and_then(|index| self.modes.get(index))
    }

    /// Modes that can still be selected
    pub fn live_modes(
        &self,
    ) -> impl Iterator<Item = (usize, &WlMonitorMode<M>)> {
        self.modes.iter().enumerate().filter(|(_, m)| !m.retired)
    }

    /// Display label for logs
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}
