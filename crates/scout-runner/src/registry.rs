// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Tool sets for the two run kinds.

use std::sync::Arc;

use scout_tools::{
    ClickTool, ConsoleMessagesTool, CreateDirectoryTool, CreateFileTool, DragTool, FileSearchTool,
    FileUploadTool, GeneratorReadLogTool, GeneratorSetupPageTool, HandleDialogTool, HoverTool,
    ListDirectoryTool, NavigateBackTool, NavigateTool, NetworkRequestsTool, PageSession,
    PlannerSetupPageTool, PressKeyTool, ReadFileTool, SelectOptionTool, SnapshotTool, TextSearchTool,
    ToolRegistry, TypeTool, VerifyElementVisibleTool, VerifyListVisibleTool, VerifyTextVisibleTool,
    VerifyValueTool, WaitForTool, Workspace,
};

pub enum ToolSetProfile {
    /// Page exploration plus file-system tools over `workspace`.
    Planner { workspace: Workspace },
    /// Page tools with action recording and the log reader.
    Generator,
}

/// Build the registry for one run.  `session` is owned by that run alone.
pub fn build_tool_registry(session: Arc<PageSession>, profile: ToolSetProfile) -> ToolRegistry {
    let mut reg = ToolRegistry::new();

    match profile {
        ToolSetProfile::Planner { workspace } => {
            reg.register(PlannerSetupPageTool(session.clone()));
            reg.register(ListDirectoryTool(workspace.clone()));
            reg.register(CreateDirectoryTool(workspace.clone()));
            reg.register(ReadFileTool(workspace.clone()));
            reg.register(CreateFileTool(workspace.clone()));
            reg.register(FileSearchTool(workspace.clone()));
            reg.register(TextSearchTool(workspace));
        }
        ToolSetProfile::Generator => {
            reg.register(GeneratorSetupPageTool(session.clone()));
            reg.register(GeneratorReadLogTool(session.clone()));
        }
    }

    reg.register(NavigateTool(session.clone()));
    reg.register(NavigateBackTool(session.clone()));
    reg.register(SnapshotTool(session.clone()));
    reg.register(ClickTool(session.clone()));
    reg.register(TypeTool(session.clone()));
    reg.register(PressKeyTool(session.clone()));
    reg.register(HoverTool(session.clone()));
    reg.register(SelectOptionTool(session.clone()));
    reg.register(FileUploadTool(session.clone()));
    reg.register(DragTool(session.clone()));
    reg.register(HandleDialogTool(session.clone()));
    reg.register(VerifyTextVisibleTool(session.clone()));
    reg.register(VerifyElementVisibleTool(session.clone()));
    reg.register(VerifyValueTool(session.clone()));
    reg.register(VerifyListVisibleTool(session.clone()));
    reg.register(WaitForTool(session.clone()));
    reg.register(ConsoleMessagesTool(session.clone()));
    reg.register(NetworkRequestsTool(session));
    reg
}
