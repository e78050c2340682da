use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use anyhow::Context;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_STATIC_DIR: &str = "public";

/// 服务器配置，从环境变量读取
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    /// 静态资源目录，未匹配的路径都从这里查找
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
        }
    }
}

impl ServerConfig {
    /// 读取 `PORT`、`CARD_DUEL_BIND`、`CARD_DUEL_STATIC_DIR`，未设置时使用默认值
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = ServerConfig::default();
        if let Some(port) = lookup("PORT") {
            config.port = port.trim().parse().with_context(|| format!("无效的 PORT: {port}"))?;
        }
        if let Some(bind) = lookup("CARD_DUEL_BIND") {
            config.bind = bind.trim().parse().with_context(|| format!("无效的 CARD_DUEL_BIND: {bind}"))?;
        }
        if let Some(dir) = lookup("CARD_DUEL_STATIC_DIR") {
            config.static_dir = PathBuf::from(dir);
        }
        Ok(config)
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}
