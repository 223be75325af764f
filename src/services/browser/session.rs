//! Chromium Session
//!
//! `UiAccessor` and `ChatDriver` over one chromiumoxide page. All DOM work
//! runs through the scripts in [`super::scripts`]; this type only navigates,
//! evaluates and polls.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use control_sweep_core::{
    discover_controls, fingerprint_token, ChatDriver, ControlDescriptor, CoreError, CoreResult,
    ElementState, Feedback, MutationPlan, RawElement, UiAccessor, UiSurface,
};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use super::scripts;
use crate::models::settings::{HarnessConfig, Timeouts};
use crate::utils::error::{AppError, AppResult};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Deserialize)]
struct ScriptOutcome {
    ok: bool,
    error: Option<String>,
}

impl ScriptOutcome {
    fn into_result(self, context: &str) -> CoreResult<()> {
        if self.ok {
            Ok(())
        } else {
            Err(CoreError::browser(format!(
                "{}: {}",
                context,
                self.error.unwrap_or_else(|| "unknown error".to_string())
            )))
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApplyOutcome {
    clicked: bool,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    text: String,
    streaming: bool,
}

fn cdp_error(context: &str, err: impl std::fmt::Display) -> CoreError {
    CoreError::browser(format!("{}: {}", context, err))
}

/// One browser page driving the dashboard.
pub struct BrowserSession {
    browser: Mutex<Browser>,
    page: Page,
    handler: JoinHandle<()>,
    ui_base: String,
    timeouts: Timeouts,
}

impl BrowserSession {
    /// Launch Chromium, or attach to `browser_ws` when configured.
    pub async fn launch(config: &HarnessConfig) -> AppResult<Self> {
        let (browser, mut handler) = match &config.browser_ws {
            Some(ws) => {
                info!(endpoint = %ws, "attaching to running browser");
                Browser::connect(ws.clone())
                    .await
                    .map_err(|e| AppError::browser(format!("connect failed: {}", e)))?
            }
            None => {
                let mut builder = BrowserConfig::builder();
                if !config.headless {
                    builder = builder.with_head();
                }
                let browser_config = builder.build().map_err(AppError::browser)?;
                info!(headless = config.headless, "launching browser");
                Browser::launch(browser_config)
                    .await
                    .map_err(|e| AppError::browser(format!("launch failed: {}", e)))?
            }
        };

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler event error");
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| AppError::browser(format!("new page failed: {}", e)))?;

        Ok(Self {
            browser: Mutex::new(browser),
            page,
            handler,
            ui_base: config.ui_base.clone(),
            timeouts: config.timeouts(),
        })
    }

    /// Close the browser and stop the event handler.
    pub async fn close(&self) {
        if let Err(e) = self.browser.lock().await.close().await {
            warn!(error = %e, "browser close failed");
        }
        self.handler.abort();
    }

    async fn eval<T: DeserializeOwned>(&self, script: String) -> CoreResult<T> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| cdp_error("evaluate", e))?;
        let text: String = result
            .into_value()
            .map_err(|e| cdp_error("script result", e))?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn wait_until_ready(&self) -> CoreResult<()> {
        let deadline = Instant::now() + self.timeouts.ready;
        loop {
            if self.eval::<bool>(scripts::ready()).await.unwrap_or(false) {
                break;
            }
            if Instant::now() >= deadline {
                return Err(CoreError::timeout(format!(
                    "application not ready after {:?}",
                    self.timeouts.ready
                )));
            }
            sleep(POLL_INTERVAL).await;
        }
        sleep(self.timeouts.settle).await;
        Ok(())
    }

    /// Wait for the control to be present, visible and enabled.
    async fn wait_actionable(&self, selector: &str) -> CoreResult<()> {
        let deadline = Instant::now() + self.timeouts.control;
        loop {
            if let Some(state) = self.inspect(selector).await? {
                if state.is_actionable() {
                    return Ok(());
                }
            }
            if Instant::now() >= deadline {
                return Err(CoreError::timeout(format!(
                    "control {} not actionable after {:?}",
                    selector, self.timeouts.control
                )));
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl UiAccessor for BrowserSession {
    async fn navigate(&self, surface: &UiSurface) -> CoreResult<()> {
        let url = format!("{}{}", self.ui_base, surface.path());
        debug!(url = %url, "navigate");
        self.page
            .goto(url.as_str())
            .await
            .map_err(|e| cdp_error(&format!("navigate {}", url), e))?;
        self.wait_until_ready().await
    }

    async fn reload(&self) -> CoreResult<()> {
        self.page
            .reload()
            .await
            .map_err(|e| cdp_error("reload", e))?;
        self.wait_until_ready().await
    }

    async fn discover(&self) -> CoreResult<Vec<ControlDescriptor>> {
        let raw: Vec<RawElement> = self.eval(scripts::discover()).await?;
        let found = discover_controls(&raw);

        let stamps: Vec<(usize, String)> = found
            .iter()
            .filter(|(_, control)| control.uses_stamp())
            .map(|(index, control)| (*index, fingerprint_token(&control.fingerprint)))
            .collect();
        if !stamps.is_empty() {
            let stamped: usize = self.eval(scripts::stamp(&stamps)).await?;
            debug!(stamped, "fallback identity attributes stamped");
        }

        debug!(candidates = raw.len(), controls = found.len(), "discovery");
        Ok(found.into_iter().map(|(_, control)| control).collect())
    }

    async fn inspect(&self, selector: &str) -> CoreResult<Option<ElementState>> {
        self.eval(scripts::inspect(selector)).await
    }

    async fn mutate(&self, selector: &str, plan: &MutationPlan) -> CoreResult<()> {
        self.wait_actionable(selector).await?;
        let outcome: ScriptOutcome = self.eval(scripts::mutate(selector, plan)?).await?;
        outcome.into_result(&format!("{} on {}", plan.action_name(), selector))
    }

    async fn apply_changes(&self, timeout: Duration) -> CoreResult<bool> {
        let outcome: ApplyOutcome = self.eval(scripts::apply()).await?;
        if !outcome.clicked {
            return Ok(false);
        }
        let deadline = Instant::now() + timeout;
        while self.eval::<bool>(scripts::apply_pending()).await? {
            if Instant::now() >= deadline {
                return Err(CoreError::timeout(format!(
                    "apply did not complete within {:?}",
                    timeout
                )));
            }
            sleep(POLL_INTERVAL).await;
        }
        Ok(true)
    }

    async fn is_rendered(&self) -> CoreResult<bool> {
        self.eval(scripts::rendered()).await
    }
}

#[async_trait]
impl ChatDriver for BrowserSession {
    async fn assistant_response_count(&self) -> CoreResult<usize> {
        self.eval(scripts::assistant_count()).await
    }

    async fn submit_question(&self, question: &str) -> CoreResult<()> {
        let outcome: ScriptOutcome = self.eval(scripts::submit_question(question)).await?;
        outcome.into_result("submit question")
    }

    /// Wait for message `previous_count` to appear and stop streaming.
    async fn wait_for_response(&self, previous_count: usize, timeout: Duration) -> CoreResult<String> {
        let deadline = Instant::now() + timeout;
        let mut last_text: Option<String> = None;
        loop {
            let message: Option<AssistantMessage> =
                self.eval(scripts::assistant_text(previous_count)).await?;
            if let Some(message) = message {
                let stable = last_text.as_deref() == Some(message.text.as_str());
                if !message.streaming && stable && !message.text.trim().is_empty() {
                    return Ok(message.text);
                }
                last_text = Some(message.text);
            }
            if Instant::now() >= deadline {
                return Err(CoreError::timeout(format!(
                    "no assistant response within {:?}",
                    timeout
                )));
            }
            sleep(Duration::from_secs(1)).await;
        }
    }

    async fn send_feedback(&self, feedback: Feedback) -> CoreResult<()> {
        let outcome: ScriptOutcome = self.eval(scripts::send_feedback(feedback)).await?;
        outcome.into_result("send feedback")
    }

    async fn select_model(&self, model_id: &str) -> CoreResult<()> {
        let outcome: ScriptOutcome = self.eval(scripts::select_model(model_id)).await?;
        outcome.into_result("select model")?;
        sleep(self.timeouts.settle).await;
        Ok(())
    }
}
