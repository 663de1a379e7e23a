use bevy::prelude::*;
use serde::Deserialize;
use std::{fs, path::Path};

use crate::fluid::SolverConfig;

#[derive(Debug, Deserialize, Resource, Clone, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    pub width: f32,
    pub height: f32,
    pub title: String,
    #[serde(rename = "autoClose")]
    pub auto_close: f32,
}
impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
            title: "Portfolio Fluid".into(),
            auto_close: 0.0,
        }
    }
}

/// Stand-in for the page's opening animation.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct IntroConfig {
    pub duration_secs: f32,
}
impl Default for IntroConfig {
    fn default() -> Self {
        Self { duration_secs: 2.5 }
    }
}

/// One fluid surface placed on the window.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SurfaceConfig {
    pub name: String,
    /// `(x, y, w, h)` as fractions of the window, origin top-left.
    pub region: (f32, f32, f32, f32),
    pub z: f32,
    pub play_after_intro: bool,
    pub solver: SolverConfig,
}
impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            name: "hero".into(),
            region: (0.0, 0.0, 1.0, 1.0),
            z: 0.0,
            play_after_intro: false,
            solver: SolverConfig::hero(),
        }
    }
}
impl SurfaceConfig {
    pub fn opening() -> Self {
        Self {
            name: "opening".into(),
            z: 1.0,
            play_after_intro: true,
            solver: SolverConfig::opening(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BlobConfig {
    /// Center as fractions of the window.
    pub position: (f32, f32),
    /// Fraction of `min(width, height)`.
    pub radius: f32,
    /// 0-255 channels.
    pub color: (u8, u8, u8),
    pub alpha: f32,
}
impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            position: (0.5, 0.5),
            radius: 0.3,
            color: (255, 255, 255),
            alpha: 0.5,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BackgroundConfig {
    pub enabled: bool,
    pub clear_color: (f32, f32, f32),
    /// Phase advance per frame.
    pub phase_step: f32,
    /// Pixels moved per frame along each axis.
    pub drift: f32,
    pub blobs: Vec<BlobConfig>,
}
impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            clear_color: (1.0, 1.0, 1.0),
            phase_step: 0.0005,
            drift: 0.5,
            blobs: vec![
                BlobConfig {
                    position: (0.3, 0.3),
                    radius: 0.4,
                    color: (127, 82, 255),
                    alpha: 0.4,
                },
                BlobConfig {
                    position: (0.7, 0.6),
                    radius: 0.35,
                    color: (59, 130, 246),
                    alpha: 0.3,
                },
                BlobConfig {
                    position: (0.5, 0.8),
                    radius: 0.3,
                    color: (255, 255, 255),
                    alpha: 0.6,
                },
            ],
        }
    }
}

/// Outcome of loading the config, logged once the log subscriber is up.
#[derive(Debug, Resource, Clone, Default, PartialEq)]
pub struct ConfigReport {
    pub layers: Vec<String>,
    pub issues: Vec<String>,
}

#[derive(Debug, Deserialize, Resource, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub intro: IntroConfig,
    pub surfaces: Vec<SurfaceConfig>,
    pub background: BackgroundConfig,
}
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            window: Default::default(),
            intro: Default::default(),
            surfaces: vec![SurfaceConfig::default(), SurfaceConfig::opening()],
            background: Default::default(),
        }
    }
}
impl AppConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let data = fs::read_to_string(&path).map_err(|e| format!("read config: {e}"))?;
        ron::from_str(&data).map_err(|e| format!("parse RON: {e}"))
    }
    pub fn load_or_default(path: impl AsRef<Path>) -> (Self, Option<String>) {
        match Self::load_from_file(&path) {
            Ok(cfg) => (cfg, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }
    /// Merge RON files in order, later keys overriding earlier ones.
    /// Returns the config, the files that were used and any problems met.
    pub fn load_layered<P, I>(paths: I) -> (Self, Vec<String>, Vec<String>)
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = P>,
    {
        use ron::value::Value;
        let mut merged: Option<Value> = None;
        let mut used = Vec::new();
        let mut errors = Vec::new();
        fn merge_value(base: &mut Value, overlay: Value) {
            match (base, overlay) {
                (Value::Map(bm), Value::Map(om)) => {
                    for (k, v) in om.into_iter() {
                        let mut incoming = Some(v);
                        for (ek, ev) in bm.iter_mut() {
                            if *ek == k {
                                if let Some(val) = incoming.take() {
                                    merge_value(ev, val);
                                }
                                break;
                            }
                        }
                        if let Some(val) = incoming {
                            bm.insert(k, val);
                        }
                    }
                }
                (b, o) => *b = o,
            }
        }
        for p in paths {
            let path_ref = p.as_ref();
            match fs::read_to_string(path_ref) {
                Ok(txt) => match ron::from_str::<Value>(&txt) {
                    Ok(val) => {
                        if let Some(cur) = &mut merged {
                            merge_value(cur, val);
                        } else {
                            merged = Some(val);
                        }
                        used.push(path_ref.as_os_str().to_string_lossy().to_string());
                    }
                    Err(e) => errors.push(format!("{}: parse error: {e}", path_ref.display())),
                },
                Err(e) => errors.push(format!("{}: read error: {e}", path_ref.display())),
            }
        }
        let Some(val) = merged else {
            return (AppConfig::default(), used, errors);
        };
        match val.into_rust::<AppConfig>() {
            Ok(cfg) => (cfg, used, errors),
            Err(e) => {
                errors.push(format!("failed to deserialize merged config; using defaults: {e}"));
                (AppConfig::default(), used, errors)
            }
        }
    }
    pub fn validate(&self) -> Vec<String> {
        let mut w = Vec::new();
        if self.window.width <= 0.0 || self.window.height <= 0.0 {
            w.push("window dimensions must be > 0".into());
        }
        if self.window.auto_close < 0.0 {
            w.push(format!(
                "window.autoClose {} negative -> treated as disabled (should be >= 0)",
                self.window.auto_close
            ));
        } else if self.window.auto_close > 0.0 && self.window.auto_close < 0.01 {
            w.push(format!(
                "window.autoClose {} very small; closes almost immediately",
                self.window.auto_close
            ));
        }
        if self.intro.duration_secs < 0.0 {
            w.push(format!(
                "intro.duration_secs {} negative -> intro ends immediately",
                self.intro.duration_secs
            ));
        }
        if self.surfaces.is_empty() {
            w.push("no surfaces configured; nothing will be simulated".into());
        }
        for (i, s) in self.surfaces.iter().enumerate() {
            if self.surfaces[..i].iter().any(|o| o.name == s.name) {
                w.push(format!("surface name '{}' used more than once", s.name));
            }
            let (x, y, rw, rh) = s.region;
            if rw <= 0.0 || rh <= 0.0 {
                w.push(format!("surface '{}' region has no area", s.name));
            }
            if x < 0.0 || y < 0.0 || x + rw > 1.0 + 1e-4 || y + rh > 1.0 + 1e-4 {
                w.push(format!("surface '{}' region {:?} extends past the window", s.name, s.region));
            }
            if s.play_after_intro && !s.solver.start_paused {
                w.push(format!(
                    "surface '{}' waits for the intro but is not start_paused; it runs immediately",
                    s.name
                ));
            }
            if let Err(e) = s.solver.check() {
                w.push(format!("surface '{}': {e}", s.name));
            }
            w.extend(s.solver.validate().into_iter().map(|m| format!("surface '{}': {m}", s.name)));
        }
        for (i, b) in self.background.blobs.iter().enumerate() {
            if !(0.0..=1.0).contains(&b.alpha) {
                w.push(format!("background.blobs[{i}].alpha {} outside 0..1", b.alpha));
            }
            if b.radius <= 0.0 {
                w.push(format!("background.blobs[{i}].radius must be > 0"));
            }
        }
        w
    }
}
