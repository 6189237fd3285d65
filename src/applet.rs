// Per-instance chart state: configuration, trend history, the latest parse and status text.
// One tick runs the command and replaces the parsed rows; a frame is computed on demand
// from whatever state is current.
use crate::command::CommandRunner;
use crate::config::{apply_config, ChartConfig, RefreshSet};
use crate::history::HistoryBuffer;
use crate::layout::{layout, LayoutOutput, TextMeasure};
use crate::parser::{parse_output, ParseResult};
use crate::render::{render_frame, DrawCommand};
use tracing::{debug, info, warn};

pub const INITIAL_STATUS: &str = "CMD Chart";
pub const ERROR_STATUS: &str = "Error executing command";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Updated { rows: usize, elements: usize },
    Failed,
}

pub struct Applet {
    config: ChartConfig,
    history: HistoryBuffer,
    rows: ParseResult,
    last_output: String,
    status: String,
}

impl Applet {
    pub fn new(config: ChartConfig, history: HistoryBuffer) -> Self {
        Self {
            config,
            history,
            rows: Vec::new(),
            last_output: String::new(),
            status: INITIAL_STATUS.to_string(),
        }
    }

    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    pub fn rows(&self) -> &ParseResult {
        &self.rows
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    /// Run the configured command once and replace the parsed state. Never fails:
    /// errors clear the rows and show up in the status text.
    pub async fn tick(&mut self, runner: &dyn CommandRunner) -> TickOutcome {
        let command = self.config.effective_command().to_string();
        debug!("Executing command: {}", command);

        let output = match runner.run(&command, self.config.timeout()).await {
            Ok(output) => output,
            Err(e) => {
                warn!("Error executing command: {}", e);
                return self.fail();
            }
        };

        if !output.stderr.trim().is_empty() {
            info!("command '{}' error: '{}'", command, output.stderr.trim());
        }

        let stdout = output.stdout.trim();
        if !output.success || stdout.is_empty() {
            warn!(
                "Command '{}' produced no usable output (success: {})",
                command, output.success
            );
            return self.fail();
        }

        debug!("Command output: {}", stdout);
        self.ingest(stdout)
    }

    /// Parse a command output directly, as if a tick had produced it.
    pub fn ingest(&mut self, output: &str) -> TickOutcome {
        let output = output.trim();
        let rows = parse_output(output, &mut self.history);
        let elements = rows.iter().map(Vec::len).sum();
        debug!("Parsed {} elements: {:?}", elements, rows);

        self.rows = rows;
        self.last_output = output.to_string();
        self.status = format!("CMD: {}", self.last_output);
        TickOutcome::Updated {
            rows: self.rows.len(),
            elements,
        }
    }

    fn fail(&mut self) -> TickOutcome {
        self.rows = Vec::new();
        self.status = ERROR_STATUS.to_string();
        TickOutcome::Failed
    }

    /// Swap in a new configuration snapshot and report what needs refreshing.
    pub fn reconfigure(&mut self, next: ChartConfig) -> RefreshSet {
        let refresh = apply_config(&self.config, &next);
        if !refresh.is_empty() {
            info!("Settings changed");
            self.config = next;
        }
        refresh
    }

    pub fn layout(&self, measure: &dyn TextMeasure) -> LayoutOutput {
        layout(&self.rows, &self.config.layout_params(), measure)
    }

    /// Draw commands for the current state. Does not re-run the command.
    pub fn frame(&self, measure: &dyn TextMeasure) -> Vec<DrawCommand> {
        let layout = self.layout(measure);
        render_frame(&layout, &self.history.snapshot(), &self.config.render_style())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandOutput, RunFuture};
    use crate::error::ChartError;
    use crate::history::MemoryHistoryStore;
    use crate::layout::EstimatedText;
    use std::cell::RefCell;
    use std::time::Duration;

    struct FakeRunner {
        replies: RefCell<Vec<Result<CommandOutput, String>>>,
        seen: RefCell<Vec<String>>,
    }

    impl FakeRunner {
        fn new(replies: Vec<Result<CommandOutput, String>>) -> Self {
            Self {
                replies: RefCell::new(replies),
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl CommandRunner for FakeRunner {
        fn run<'a>(&'a self, command: &'a str, _timeout: Duration) -> RunFuture<'a> {
            self.seen.borrow_mut().push(command.to_string());
            let reply = self.replies.borrow_mut().remove(0);
            Box::pin(async move {
                reply.map_err(ChartError::Draw)
            })
        }
    }

    fn ok(stdout: &str) -> Result<CommandOutput, String> {
        Ok(CommandOutput {
            success: true,
            stdout: stdout.to_string(),
            stderr: String::new(),
        })
    }

    fn applet() -> Applet {
        let history = HistoryBuffer::new(Box::new(MemoryHistoryStore::default()));
        Applet::new(ChartConfig::default(), history)
    }

    #[tokio::test]
    async fn test_tick_success_replaces_state() {
        let mut applet = applet();
        let runner = FakeRunner::new(vec![ok("CR:r|TXT:Hi\n"), ok("CR:g")]);

        let outcome = applet.tick(&runner).await;
        assert_eq!(outcome, TickOutcome::Updated { rows: 1, elements: 2 });
        assert_eq!(applet.status(), "CMD: CR:r|TXT:Hi");
        assert_eq!(runner.seen.borrow()[0], "echo \"CR:g\"");

        applet.tick(&runner).await;
        assert_eq!(applet.rows().len(), 1);
        assert_eq!(applet.rows()[0].len(), 1);
    }

    #[tokio::test]
    async fn test_tick_failures_clear_rows() {
        let mut applet = applet();
        applet.ingest("CR:r");
        let runner = FakeRunner::new(vec![
            Ok(CommandOutput {
                success: false,
                stdout: "CR:r".to_string(),
                stderr: "boom".to_string(),
            }),
            ok("   \n"),
            Err("spawn failed".to_string()),
        ]);

        for _ in 0..3 {
            applet.ingest("CR:r");
            assert_eq!(applet.tick(&runner).await, TickOutcome::Failed);
            assert!(applet.rows().is_empty());
            assert_eq!(applet.status(), ERROR_STATUS);
        }

        // still paints a background-only frame
        let frame = applet.frame(&EstimatedText);
        assert_eq!(frame.len(), 1);
    }

    #[tokio::test]
    async fn test_trend_tokens_feed_history() {
        let mut applet = applet();
        let runner = FakeRunner::new(vec![ok("GR:b:42"), ok("GR:b:58|CR:g")]);
        applet.tick(&runner).await;
        applet.tick(&runner).await;
        let snap = applet.history().snapshot();
        assert_eq!(snap.samples, vec![42.0, 58.0]);
        assert_eq!(snap.trend_color, "b");
        // background, trend line, circle
        assert_eq!(applet.frame(&EstimatedText).len(), 3);
    }

    #[test]
    fn test_reconfigure() {
        let mut applet = applet();
        assert!(applet.reconfigure(ChartConfig::default()).is_empty());

        let mut next = ChartConfig::default();
        next.chart_width = 80;
        assert_eq!(applet.reconfigure(next), RefreshSet::all());
        assert_eq!(applet.config().chart_width, 80);

        applet.ingest("CR:r|CR:g|CR:b|CR:y");
        assert!(applet.layout(&EstimatedText).overflow_at.is_some());
    }
}
