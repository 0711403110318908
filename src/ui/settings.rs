pub const DEFAULT_LIGHT_INTENSITY: f32 = 0.5;
pub const DEFAULT_MODEL_SCALE: f32 = 1.0;
pub const MIN_MODEL_SCALE: f32 = 0.1;
pub const MAX_SLIDER_SCALE: f32 = 5.0;
pub const SCALE_STEP: f32 = 0.1;
pub const MAX_LIGHT_INTENSITY: f32 = 2.0;
pub const DEFAULT_BACKGROUND: [u8; 3] = [0xf0, 0xf0, 0xf0];

/// Active transform gizmo. At most one is shown at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TransformMode {
    #[default]
    None,
    Translate,
    Rotate,
    Scale,
}

impl TransformMode {
    pub const BUTTONS: [TransformMode; 3] = [
        TransformMode::Translate,
        TransformMode::Rotate,
        TransformMode::Scale,
    ];

    /// Mode after pressing `pressed`'s button: the active mode toggles off,
    /// any other mode replaces it.
    pub fn toggled(self, pressed: TransformMode) -> TransformMode {
        if self == pressed {
            TransformMode::None
        } else {
            pressed
        }
    }

    pub fn is_active(self) -> bool {
        self != TransformMode::None
    }

    pub fn label(self) -> &'static str {
        match self {
            TransformMode::None => "None",
            TransformMode::Translate => "Move",
            TransformMode::Rotate => "Rotate",
            TransformMode::Scale => "Scale",
        }
    }
}

/// Presentation parameters edited from the control panel. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSettings {
    pub light_intensity: f32,
    pub background: [u8; 3],
    pub auto_rotate: bool,
    pub scale: f32,
    pub transform_mode: TransformMode,
    pub show_controls: bool,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            light_intensity: DEFAULT_LIGHT_INTENSITY,
            background: DEFAULT_BACKGROUND,
            auto_rotate: false,
            scale: DEFAULT_MODEL_SCALE,
            transform_mode: TransformMode::None,
            show_controls: true,
        }
    }
}

impl ViewSettings {
    pub fn with_defaults(light_intensity: f32, background: [u8; 3], scale: f32) -> Self {
        Self {
            light_intensity: light_intensity.clamp(0.0, MAX_LIGHT_INTENSITY),
            background,
            scale: scale.max(MIN_MODEL_SCALE),
            ..Self::default()
        }
    }

    pub fn press_mode(&mut self, pressed: TransformMode) {
        self.transform_mode = self.transform_mode.toggled(pressed);
    }

    /// Scale step from the -/+ buttons. Never drops below the minimum scale.
    pub fn adjust_scale(&mut self, amount: f32) {
        self.scale = (self.scale + amount).max(MIN_MODEL_SCALE);
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale.max(MIN_MODEL_SCALE);
    }

    /// Restores intensity, scale, auto-rotate and transform mode. Background
    /// colour and panel visibility are left as they are.
    pub fn reset(&mut self) {
        self.transform_mode = TransformMode::None;
        self.light_intensity = DEFAULT_LIGHT_INTENSITY;
        self.auto_rotate = false;
        self.scale = DEFAULT_MODEL_SCALE;
    }

    /// Called when the user grabs a gizmo handle.
    pub fn begin_gizmo_drag(&mut self) {
        if self.auto_rotate {
            log::debug!("Gizmo drag started; auto-rotate suspended");
        }
        self.auto_rotate = false;
    }

    /// Auto-rotate only runs while no transform gizmo is active.
    pub fn effective_auto_rotate(&self) -> bool {
        self.auto_rotate && !self.transform_mode.is_active()
    }

    pub fn ambient_intensity(&self) -> f32 {
        self.light_intensity
    }

    pub fn spot_intensity(&self) -> f32 {
        self.light_intensity * 2.0
    }
}

pub fn parse_hex_color(value: &str) -> Option<[u8; 3]> {
    let hex = value.trim().trim_start_matches('#');
    if !hex.is_ascii() {
        return None;
    }
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return None,
    };
    let channel = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

pub fn format_hex_color(rgb: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2])
}
