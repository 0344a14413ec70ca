use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use clap_verbosity_flag::Verbosity;
use env_logger::Builder;
use log::{error, info};
use memq_broker::{Broker, BrokerConfig, TcpServer, TcpServerOptions};

#[derive(Parser, Debug)]
#[command(version, about)]
struct UserArgs {
    /// Path to the broker TOML configuration file
    #[clap(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Address to bind this broker to, overrides `server.listen_addr`
    #[clap(short = 'a', long = "bind-addr")]
    bind_addr: Option<SocketAddr>,

    /// Can be called multiple times to increase output, overrides `logging.level`
    #[clap(flatten)]
    verbose: Verbosity,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = UserArgs::parse();

    let mut config = match &args.config {
        Some(path) => BrokerConfig::from_file(path)?,
        None => BrokerConfig::default(),
    };
    if let Some(addr) = args.bind_addr {
        config.server.listen_addr = addr;
    }

    let level = if args.verbose.is_present() {
        args.verbose.log_level_filter()
    } else {
        config.logging.level_filter()?
    };
    Builder::new()
        .filter_module(&env!("CARGO_PKG_NAME").replace('-', "_"), level)
        .init();

    let broker = match Broker::new(config.topics.clone()) {
        Ok(broker) => broker,
        Err(e) => {
            error!("代理配置无效: {} / Invalid broker configuration: {}", e, e);
            return Err(e.into());
        }
    };
    info!("已加载 {} 个主题 / Loaded {} topics", broker.topic_names().len(), broker.topic_names().len());

    let server = TcpServer::new(
        Arc::new(broker),
        TcpServerOptions { listen_addr: config.server.listen_addr },
    );
    if let Err(e) = server.start().await {
        error!("接受连接时出错: {:?} / Error occurred while accepting connections: {:?}", e, e);
        return Err(e);
    }

    Ok(())
}
