use std::sync::Arc;

use probeforge_plugins::PluginManager;
use probeforge_registry::CapabilityRegistry;

#[derive(Clone)]
pub struct ManagementState {
    pub registry: Arc<CapabilityRegistry>,
    pub plugins: Arc<PluginManager>,
}
