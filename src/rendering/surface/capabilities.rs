//! One-shot adapter probing for fluid surfaces.
//!
//! `RenderPlugin` inserts `RenderAdapter` and `RenderAdapterInfo` into the
//! main world. The probe runs once at startup, records which field formats
//! the adapter can sample and filter, and stores the answers as a resource
//! every surface binds against. Without an adapter (headless runs) it falls
//! back to a software probe and says so.
use bevy::prelude::*;
use bevy::render::renderer::{RenderAdapter, RenderAdapterInfo};

use crate::fluid::{AdapterProbe, ProbeSnapshot, SoftwareProbe};

#[derive(Resource, Debug, Clone)]
pub struct SurfaceCapabilities {
    pub probe: ProbeSnapshot,
    pub backend: String,
    /// No adapter was found; formats are assumed, not probed.
    pub software: bool,
}

impl SurfaceCapabilities {
    pub fn software() -> Self {
        Self {
            probe: ProbeSnapshot::capture(&SoftwareProbe::full()),
            backend: "none".into(),
            software: true,
        }
    }
}

pub(crate) fn probe_capabilities(
    mut commands: Commands,
    adapter: Option<Res<RenderAdapter>>,
    info: Option<Res<RenderAdapterInfo>>,
    existing: Option<Res<SurfaceCapabilities>>,
) {
    if existing.is_some() {
        return;
    }
    let caps = match (adapter, info) {
        (Some(adapter), Some(info)) => {
            let backend = format!("{:?}", info.backend);
            info!(target: "fluid_host", "Adapter=\"{}\" backend={backend} device_type={:?}", info.name, info.device_type);
            SurfaceCapabilities {
                probe: ProbeSnapshot::capture(&AdapterProbe(&adapter)),
                backend,
                software: false,
            }
        }
        _ => {
            warn!(target: "fluid_host", "No render adapter present; binding surfaces against the software probe");
            SurfaceCapabilities::software()
        }
    };
    commands.insert_resource(caps);
}
