use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::geo::GeoFix;
use crate::runtime::RunController;
use crate::tracking::{LiveStats, RunSummary, Unit};

/// Commands a UI collaborator issues against the active run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "command", content = "args", rename_all = "camelCase")]
pub enum RunCommand {
    Start(GeoFix),
    Pause,
    Resume,
    Stop,
    SetUnit(Unit),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum CommandReply {
    Live(LiveStats),
    Finished(RunSummary),
}

impl CommandReply {
    pub fn live(&self) -> Option<&LiveStats> {
        match self {
            CommandReply::Live(stats) => Some(stats),
            CommandReply::Finished(_) => None,
        }
    }

    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            CommandReply::Finished(summary) => Some(summary),
            CommandReply::Live(_) => None,
        }
    }
}

pub async fn dispatch(controller: &RunController, command: RunCommand) -> Result<CommandReply> {
    let reply = match command {
        RunCommand::Start(initial_fix) => CommandReply::Live(controller.start(initial_fix).await?),
        RunCommand::Pause => CommandReply::Live(controller.pause().await?),
        RunCommand::Resume => CommandReply::Live(controller.resume().await?),
        RunCommand::Stop => CommandReply::Finished(controller.stop().await?),
        RunCommand::SetUnit(unit) => CommandReply::Live(controller.set_unit(unit).await),
    };
    Ok(reply)
}

/// Same as [`dispatch`], flattening errors to strings for a UI boundary.
pub async fn dispatch_for_ui(
    controller: &RunController,
    command: RunCommand,
) -> Result<CommandReply, String> {
    dispatch(controller, command).await.map_err(|e| e.to_string())
}
