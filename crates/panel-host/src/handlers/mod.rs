//! Built-in handlers for the panel's message types.

mod analysis;
mod dummy_data;
mod echo;
mod lifecycle;

use panel_bridge::RequestRouter;

use crate::config::SimulationConfig;

pub use analysis::{simulate_analysis, AnalysisReport, Issue, Metrics, RunAnalysis};
pub use dummy_data::{DummyData, DummyDataHandler};
pub use echo::{Ping, TestEcho};
pub use lifecycle::UiReady;

pub const WEBVIEW_UI_READY: &str = "webviewUiReady";
pub const PING: &str = "ping";
pub const PONG: &str = "pong";
pub const TEST_FROM_WEBVIEW: &str = "testFromWebview";
pub const TEST_RESPONSE: &str = "testResponseFromExtension";
pub const GET_DUMMY_DATA: &str = "getDummyData";
pub const DUMMY_DATA_RESPONSE: &str = "dummyDataResponse";
pub const RUN_ANALYSIS: &str = "runAnalysis";
pub const ANALYSIS_RESULT: &str = "analysisResult";
pub const ANALYSIS_ERROR: &str = "analysisError";

/// Registers every built-in handler on `router`.
pub fn register_defaults(router: &mut RequestRouter, simulation: &SimulationConfig) {
    router.register(WEBVIEW_UI_READY, UiReady::default());
    router.register(PING, Ping);
    router.register(TEST_FROM_WEBVIEW, TestEcho);
    router.register(
        GET_DUMMY_DATA,
        DummyDataHandler::new(simulation.dummy_data_delay),
    );
    router.register(RUN_ANALYSIS, RunAnalysis::new(simulation.analysis_delay));
}
