//! # 示例应用程序
//!
//! 在单个进程内模拟一个集群：每个节点发布一条注册表记录，
//! 随后让指定节点离开集群，并打印存活节点看到的注册表内容。

use anyhow::Context;
use clap::Parser;
use infrastructure_common::Lifecycle;
use registry_abstractions::{Address, Node, RegistryListener, StaticEntryProvider};
use registry_composition::{RegistryInfrastructureBuilder, RegistryMode, RegistrySettings};
use registry_impl::{InMemoryCache, InMemoryCluster, RegistryService};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "example-app")]
#[command(about = "集群注册表示例应用")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 模拟的节点数量
    #[arg(long, default_value_t = 3)]
    nodes: usize,

    /// 离开集群的节点名称，可重复指定
    #[arg(long)]
    depart: Vec<String>,

    /// 使用本地注册表而不是集群注册表
    #[arg(long)]
    local: bool,

    /// 日志级别，覆盖配置文件
    #[arg(long)]
    log_level: Option<String>,
}

/// 把通知写入日志的监听器
struct LoggingListener {
    node: Node,
}

impl RegistryListener<String, String> for LoggingListener {
    fn added_entries(&self, added: &HashMap<String, String>) {
        info!("[{}] 新增记录: {:?}", self.node, added);
    }

    fn updated_entries(&self, updated: &HashMap<String, String>) {
        info!("[{}] 更新记录: {:?}", self.node, updated);
    }

    fn removed_entries(&self, removed: &HashMap<String, String>) {
        info!("[{}] 移除记录: {:?}", self.node, removed);
    }
}

/// 模拟集群中的一个节点
struct SimulatedNode {
    node: Node,
    address: Address,
    service: RegistryService<String, String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings =
        RegistrySettings::load(args.config.as_deref()).context("加载注册表配置失败")?;
    if let Some(level) = &args.log_level {
        settings.logging.level = level.clone();
    }
    settings.mode = if args.local {
        RegistryMode::Local
    } else {
        RegistryMode::Clustered
    };

    // 初始化日志
    settings
        .logging
        .to_logging_config()?
        .init()
        .context("初始化日志失败")?;

    info!("启动集群注册表示例应用");

    match settings.mode {
        RegistryMode::Local => run_local(settings).await,
        RegistryMode::Clustered => run_clustered(settings, &args).await,
    }
}

/// 单节点演示
async fn run_local(settings: RegistrySettings) -> anyhow::Result<()> {
    let node = settings.node.clone();
    let mut service = RegistryInfrastructureBuilder::<String, String>::new(settings)
        .build_service(
            "registry",
            Arc::new(StaticEntryProvider::new(
                format!("{}-role", node),
                "primary".to_string(),
            )),
        )?;

    service.on_start().await?;
    if let Some(registry) = service.registry() {
        print_view(&node, &registry.entries());
    }
    service.on_stop().await?;

    info!("应用已关闭");
    Ok(())
}

/// 多节点集群演示
async fn run_clustered(settings: RegistrySettings, args: &Args) -> anyhow::Result<()> {
    anyhow::ensure!(args.nodes > 0, "节点数量必须大于 0");

    let cluster: InMemoryCluster<String, String> =
        InMemoryCluster::new(settings.container.clone(), settings.cache.clone());

    let mut nodes = Vec::with_capacity(args.nodes);
    for index in 1..=args.nodes {
        let name = format!("node-{}", index);
        let address = Address::new(format!("{}:7600", name));
        let cache = cluster.join(Node::new(&name), address.clone());
        let node = start_node(&settings, &cache, &name, index == 1)
            .await
            .with_context(|| format!("启动节点失败: {}", name))?;
        nodes.push(SimulatedNode {
            node: Node::new(&name),
            address,
            service: node,
        });
    }

    let departed: Vec<Address> = nodes
        .iter()
        .filter(|n| args.depart.iter().any(|name| name == n.node.name()))
        .map(|n| n.address.clone())
        .collect();
    if departed.len() < args.depart.len() {
        warn!("部分离开节点不存在: {:?}", args.depart);
    }

    if !departed.is_empty() {
        info!("节点离开集群: {:?}", departed);
        cluster.leave(&departed);
    }

    // 离开的节点视为崩溃，不再关闭其注册表
    let (gone, mut survivors): (Vec<_>, Vec<_>) = nodes
        .into_iter()
        .partition(|n| departed.contains(&n.address));
    drop(gone);

    for survivor in &survivors {
        if let Some(registry) = survivor.service.registry() {
            print_view(survivor.node.name(), &registry.entries());
        }
    }

    for survivor in &mut survivors {
        survivor.service.on_stop().await?;
    }

    info!("应用已关闭");
    Ok(())
}

async fn start_node(
    settings: &RegistrySettings,
    cache: &Arc<InMemoryCache<String, String>>,
    name: &str,
    primary: bool,
) -> anyhow::Result<RegistryService<String, String>> {
    let node_settings = RegistrySettings {
        node: name.to_string(),
        ..settings.clone()
    };
    let role = if primary { "primary" } else { "backup" };

    let mut service = RegistryInfrastructureBuilder::new(node_settings)
        .with_cache(cache.registry_config())
        .build_service(
            format!("{}-registry", name),
            Arc::new(StaticEntryProvider::new(
                format!("{}-role", name),
                role.to_string(),
            )),
        )?;
    service.on_start().await?;

    if let Some(registry) = service.registry() {
        let listener = Arc::new(LoggingListener {
            node: Node::new(name),
        });
        // 注册表关闭时会清空监听器，这里不需要保留句柄
        let _registration = registry.add_listener(listener);
    }

    Ok(service)
}

fn print_view(node: &str, entries: &HashMap<String, String>) {
    let sorted: BTreeMap<_, _> = entries.iter().collect();
    println!("{} 看到 {} 条记录:", node, sorted.len());
    for (key, value) in sorted {
        println!("  {} = {}", key, value);
    }
}
