use std::path::PathBuf;

use tally_config::{AppConfig, ConfigError};
use tally_engine::command::{CommandBus, CommandContext, CommandRequest};
use tally_engine::session::{EngineSettings, Session};
use tally_engine::summary::CategoryTable;
use tally_io::{JsonSnapshot, SnapshotLoader, write_report};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod report;

struct CliArgs {
    config: Option<PathBuf>,
    input: PathBuf,
    prefix: Option<String>,
    output: Option<PathBuf>,
}

fn main() {
    let args = parse_args();
    let config = load_configuration(args.config.clone());
    init_logging(&config);
    info!(input = %args.input.display(), "启动扰动面积统计");

    let drawing = match JsonSnapshot::new().load(&args.input) {
        Ok(drawing) => drawing,
        Err(err) => {
            error!(error = %err, "无法读取图纸快照");
            std::process::exit(1);
        }
    };

    let mut session = Session::new(drawing, engine_settings(&config));
    let command_bus = CommandBus::new();
    let mut context = CommandContext {
        session: &mut session,
    };

    let mut requests = Vec::new();
    if context.session.drawing().reference_points().is_empty() {
        info!("快照中没有参考线顶点，沿用既有标签");
    } else {
        let mut assign = CommandRequest::new("assign_labels");
        if let Some(prefix) = &args.prefix {
            assign = assign.with_arg(prefix.clone());
        }
        requests.push(assign);
    }
    requests.push(CommandRequest::new("parse_dimensions"));
    requests.push(CommandRequest::new("summarize"));

    for request in &requests {
        let response = command_bus.dispatch(request, &mut context);
        let message = response.message.unwrap_or_default();
        if response.success {
            info!(command = %request.name, "{message}");
        } else {
            error!(command = %request.name, "{message}");
            std::process::exit(1);
        }
    }

    let Some(area_report) = session.report() else {
        error!("汇总结果缺失");
        std::process::exit(1);
    };

    print!("{}", report::render_dimension_table(&area_report.dimensions));
    println!();
    print!("{}", report::render_summary_table(area_report));
    for warning in &area_report.warnings {
        println!("警告: {warning}");
    }

    if let Some(output) = &args.output {
        match write_report(area_report, output) {
            Ok(()) => info!(path = %output.display(), "报告已写出"),
            Err(err) => {
                error!(error = %err, "写出报告失败");
                std::process::exit(1);
            }
        }
    }
}

fn parse_args() -> CliArgs {
    let mut args = std::env::args().skip(1);
    let mut config = None;
    let mut input = None;
    let mut prefix = None;
    let mut output = None;

    while let Some(arg) = args.next() {
        let slot = match arg.as_str() {
            "--config" => &mut config,
            "--input" => &mut input,
            "--prefix" => &mut prefix,
            "--output" => &mut output,
            other => {
                eprintln!("未知参数：{other}");
                std::process::exit(1);
            }
        };
        let Some(value) = args.next() else {
            eprintln!("`{arg}` 需要提供参数值");
            std::process::exit(1);
        };
        *slot = Some(value);
    }

    let Some(input) = input else {
        eprintln!("用法: tally-app --input <snapshot.json> [--prefix W] [--output report.json] [--config path]");
        std::process::exit(1);
    };
    CliArgs {
        config: config.map(PathBuf::from),
        input: PathBuf::from(input),
        prefix,
        output: output.map(PathBuf::from),
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Invalid { .. } | ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}

fn engine_settings(config: &AppConfig) -> EngineSettings {
    EngineSettings {
        containment_tolerance: config.engine.containment_tolerance,
        row_tolerance: config.engine.row_tolerance,
        arc_segments: config.engine.arc_segments,
        label_prefix: config.engine.label_prefix.clone(),
        categories: CategoryTable::new(config.categories.prefixes.clone()),
    }
}
