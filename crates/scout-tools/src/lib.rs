// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod policy;
mod schema;
mod registry;
mod tool;
mod builtin;

pub use policy::{Cardinality, ParamSpec, ParamType, ToolSpec};
pub use schema::{validate_args, ArgError};
pub use registry::ToolRegistry;
pub use tool::{ToolCall, ToolOutput, Tool};
pub use builtin::fs::{
    CreateDirectoryTool, CreateFileTool, FileSearchTool, ListDirectoryTool, ReadFileTool,
    TextSearchTool, Workspace,
};
pub use builtin::page::{
    dom::{PageElement, SimplifiedDom},
    fetch::{FetchedPage, HttpFetcher, PageFetcher, StaticFetcher},
    session::{ActionEntry, NetworkEntry, PageSession},
    tools::{
        ClickTool, ConsoleMessagesTool, DragTool, FileUploadTool, GeneratorReadLogTool,
        GeneratorSetupPageTool, HandleDialogTool, HoverTool, NavigateBackTool, NavigateTool,
        NetworkRequestsTool, PlannerSetupPageTool, PressKeyTool, SelectOptionTool, SnapshotTool,
        TypeTool, VerifyElementVisibleTool, VerifyListVisibleTool, VerifyTextVisibleTool,
        VerifyValueTool, WaitForTool, GENERATOR_SETUP, PLANNER_SETUP,
    },
};
