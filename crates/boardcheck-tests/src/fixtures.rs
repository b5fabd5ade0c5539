//! Test fixtures.

use crate::fakes::{FakeExampleSource, FakeRegistry, ScriptedToolchain};
use boardcheck_harness::{HarnessConfig, HarnessPorts, JobTracker};
use std::sync::Arc;

/// A slice of the example keys a stock AVR installation exposes, including
/// the families the reference exclusions target.
pub const REFERENCE_EXAMPLES: &[&str] = &[
    "examples-01.Basics-Blink",
    "examples-01.Basics-Fade",
    "examples-04.Communication-ASCIITable",
    "examples-04.Communication-MultiSerial",
    "examples-09.USB-Keyboard-KeyboardLogout",
    "examples-09.USB-Keyboard-KeyboardMessage",
    "examples-09.USB-KeyboardAndMouseControl",
    "examples-09.USB-Mouse-ButtonMouseControl",
    "Esploraexamples-Beginners-EsploraBlink",
    "Esploraexamples-Beginners-EsploraJoystickMouse",
    "Esploraexamples-Experts-EsploraKart",
    "Firmataexamples-AllInputsFirmata",
    "Firmataexamples-StandardFirmataWiFi",
    "TFTexamples-Arduino-TFTBitmapLogo",
    "TFTexamples-Esplora-EsploraTFTTemp",
];

pub fn reference_examples() -> FakeExampleSource {
    FakeExampleSource::new(REFERENCE_EXAMPLES)
}

/// Reference config with timeouts short enough for tests.
pub fn test_config() -> HarnessConfig {
    HarnessConfig {
        setup_timeout_secs: Some(10),
        barrier_timeout_secs: Some(10),
        ..HarnessConfig::reference()
    }
}

/// Everything needed to run the harness against fakes.
pub struct TestRig {
    pub jobs: JobTracker,
    pub registry: Arc<FakeRegistry>,
    pub toolchain: ScriptedToolchain,
    pub ports: HarnessPorts,
}

impl TestRig {
    pub fn new(
        registry: FakeRegistry,
        examples: FakeExampleSource,
        toolchain: ScriptedToolchain,
        jobs: JobTracker,
    ) -> Self {
        let registry = Arc::new(registry);
        let ports = HarnessPorts {
            registry: registry.clone(),
            examples: Arc::new(examples),
            factory: Arc::new(toolchain.clone()),
            diagnostics: Arc::new(toolchain.clone()),
            scheduler: Arc::new(jobs.clone()),
        };
        Self {
            jobs,
            registry,
            toolchain,
            ports,
        }
    }

    /// AVR registry, reference examples, every build passing.
    pub fn reference() -> Self {
        let jobs = JobTracker::new();
        Self::new(
            FakeRegistry::avr(jobs.clone()),
            reference_examples(),
            ScriptedToolchain::new(),
            jobs,
        )
    }
}
