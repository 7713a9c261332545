use clap::Parser;

/// Biar Kami Masak：基于 LLM 的食谱推荐服务
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// 配置文件路径（JSON，可选，不存在时使用默认配置）
    #[arg(short, long)]
    pub config: Option<String>,

    /// 监听地址（覆盖配置文件）
    #[arg(long)]
    pub host: Option<String>,

    /// 监听端口（覆盖配置文件）
    #[arg(short, long)]
    pub port: Option<u16>,
}
