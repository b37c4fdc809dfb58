use std::collections::HashMap;

use crate::session::Session;

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse;
}

pub struct CommandContext<'a> {
    pub session: &'a mut Session,
}

pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(AssignLabelsCommand);
        bus.register(ParseDimensionsCommand);
        bus.register(SummarizeCommand);
        bus
    }

    pub fn register<H: CommandHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if let Some(handler) = self.handlers.get(request.name.as_str()) {
            handler.execute(request, context)
        } else {
            CommandResponse::err(format!("未知命令: {}", request.name))
        }
    }

    pub fn available_commands(&self) -> impl Iterator<Item = &&'static str> {
        self.handlers.keys()
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

/// 参数一为标签前缀，缺省时使用会话配置的前缀。
struct AssignLabelsCommand;

impl CommandHandler for AssignLabelsCommand {
    fn name(&self) -> &'static str {
        "assign_labels"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let prefix = match request.args.first() {
            Some(prefix) if !prefix.trim().is_empty() => prefix.trim().to_string(),
            _ => context.session.settings().label_prefix.clone(),
        };
        match context.session.assign_labels(&prefix) {
            Ok((assignment, report)) => CommandResponse::ok(format!(
                "已分配 {} 个标签（前缀 {}），清除 {} 个旧标签",
                assignment.len(),
                prefix,
                report.cleared
            )),
            Err(err) => CommandResponse::err(format!("标签分配失败: {err}")),
        }
    }
}

struct ParseDimensionsCommand;

impl CommandHandler for ParseDimensionsCommand {
    fn name(&self) -> &'static str {
        "parse_dimensions"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let count = context.session.parse_dimensions().len();
        CommandResponse::ok(format!("已解析 {count} 条尺寸注记"))
    }
}

struct SummarizeCommand;

impl CommandHandler for SummarizeCommand {
    fn name(&self) -> &'static str {
        "summarize"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        match context.session.summarize() {
            Ok(report) => CommandResponse::ok(format!(
                "已汇总 {} 个边界，{} 条警告",
                report.aggregates.len(),
                report.warnings.len()
            )),
            Err(err) => CommandResponse::err(format!("面积汇总失败: {err}")),
        }
    }
}
