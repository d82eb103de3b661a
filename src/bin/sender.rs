//! SRMP 송신자 - Semi-Reliable Multicast Protocol
//!
//! 슬라이딩 윈도우 + ACK/NAK 피드백 기반 멀티캐스트 송신자
//!
//! 사용법:
//!   cargo run --release --bin srmp-sender -- [OPTIONS]
//!
//! 예시:
//!   # 기본 전송 (0으로 채운 1000바이트 블록 20개)
//!   cargo run --release --bin srmp-sender
//!
//!   # 파일 전송, 윈도우 16
//!   cargo run --release --bin srmp-sender -- --file data.bin --window 16

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use srmp::{BlockSource, Config, FeedbackPolicy, MulticastSender, MulticastTransport, SenderEvent};

type BoxError = Box<dyn std::error::Error>;

/// 실행 옵션
struct SenderOptions {
    file_path: Option<PathBuf>,
    blocks: usize,
    config: Config,
}

impl Default for SenderOptions {
    fn default() -> Self {
        Self {
            file_path: None,
            blocks: 20,
            config: Config::default(),
        }
    }
}

fn value<T>(args: &[String], i: usize, flag: &str) -> Result<T, BoxError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = args
        .get(i + 1)
        .ok_or_else(|| format!("{} 옵션에 값이 필요함", flag))?;
    raw.parse()
        .map_err(|e| format!("{} 값이 잘못됨 ({}): {}", flag, raw, e).into())
}

fn parse_args() -> Result<SenderOptions, BoxError> {
    let args: Vec<String> = std::env::args().collect();
    let mut options = SenderOptions::default();

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--group" | "-g" => {
                options.config.group_addr = value::<Ipv4Addr>(&args, i, flag)?;
                i += 1;
            }
            "--port" | "-p" => {
                options.config.group_port = value(&args, i, flag)?;
                i += 1;
            }
            "--bind" | "-b" => {
                options.config.bind_addr = value::<SocketAddr>(&args, i, flag)?;
                i += 1;
            }
            "--join" => {
                options.config.join_group = true;
            }
            "--file" | "-f" => {
                options.file_path = Some(PathBuf::from(value::<String>(&args, i, flag)?));
                i += 1;
            }
            "--blocks" => {
                options.blocks = value(&args, i, flag)?;
                i += 1;
            }
            "--block-size" => {
                options.config.block_size = value(&args, i, flag)?;
                i += 1;
            }
            "--window" | "-w" => {
                options.config.window_size = value(&args, i, flag)?;
                i += 1;
            }
            "--timeout-ms" => {
                options.config.retransmit_timeout_ms = value(&args, i, flag)?;
                i += 1;
            }
            "--group-size" => {
                options.config.group_size = value(&args, i, flag)?;
                i += 1;
            }
            "--max-retries" => {
                let max: u32 = value(&args, i, flag)?;
                // 0은 무제한
                options.config.max_retransmissions = (max > 0).then_some(max);
                i += 1;
            }
            "--strict" => {
                options.config.feedback_policy = FeedbackPolicy::Strict;
            }
            "--help" | "-h" => {
                println!(
                    r#"SRMP Sender - Semi-Reliable Multicast Protocol 송신자

슬라이딩 윈도우 + ACK/NAK 기반 멀티캐스트 송신
- NAK된 블록만 선택적 재전송
- base 블록 타임아웃 재전송
- 혼잡 윈도우 (전진 +1, NAK -1/group_size, 타임아웃 시 최소값)

사용법:
  cargo run --release --bin srmp-sender -- [OPTIONS]

옵션:
  -g, --group <ADDR>      멀티캐스트 그룹 (기본: 239.0.0.1)
  -p, --port <PORT>       멀티캐스트 포트 (기본: 23456)
  -b, --bind <ADDR>       로컬 바인드 주소 (기본: 0.0.0.0:0)
  --join                  멀티캐스트 그룹 가입 (그룹으로 오는 피드백 수신)
  -f, --file <PATH>       전송할 파일 경로
  --blocks <N>            파일이 없을 때 합성 블록 수 (기본: 20)
  --block-size <SIZE>     블록 크기 바이트 (기본: 1000)
  -w, --window <N>        윈도우 크기 (기본: 4)
  --timeout-ms <MS>       재전송 타임아웃 (기본: 200)
  --group-size <N>        수신자 수 (기본: 1)
  --max-retries <N>       블록당 최대 재전송, 0이면 무제한 (기본: 32)
  --strict                윈도우 밖 피드백을 치명적 에러로 처리
  -h, --help              이 도움말 출력

로그 레벨은 RUST_LOG 환경 변수로 조정 (기본: info)
"#
                );
                std::process::exit(0);
            }
            other => {
                warn!("알 수 없는 옵션 무시: {}", other);
            }
        }
        i += 1;
    }

    Ok(options)
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let options = parse_args()?;
    let config = options.config;

    info!("SRMP Sender starting...");
    info!("Group: {}", config.group_socket_addr());
    info!("Bind address: {}", config.bind_addr);
    info!("Block size: {} bytes", config.block_size);
    info!("Window: {}, timeout: {}ms", config.window_size, config.retransmit_timeout_ms);

    // 전송할 블록 준비
    let source = match &options.file_path {
        Some(path) => {
            info!("Loading file: {:?}", path);
            BlockSource::from_file(path, config.block_size)?
        }
        None => {
            info!("Using synthetic data ({} x {} bytes)", options.blocks, config.block_size);
            BlockSource::synthetic(options.blocks, config.block_size)?
        }
    };
    info!("Blocks: {} ({} bytes)", source.len(), source.total_bytes());

    let transport = MulticastTransport::bind(&config).await?;
    let (sender, mut events) = MulticastSender::new(config, source, transport)?;

    // Ctrl-C로 종료
    let stopper = sender.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            stopper.shutdown();
        }
    });

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SenderEvent::Completed(stats) => {
                    info!("Transfer complete: {}/{} blocks", stats.completed_blocks, stats.total_blocks);
                }
                SenderEvent::DeliveryFailed {
                    sequence_id,
                    attempts,
                } => {
                    warn!("Block {} undeliverable after {} retransmissions", sequence_id, attempts);
                }
            }
        }
    });

    let stats = sender.run().await?;

    info!("  Time: {:.2}s", stats.elapsed().as_secs_f64());
    info!("  Throughput: {:.2} MB/s", stats.overall_throughput() / 1_000_000.0);
    info!("  Retransmissions: {} (NAK {}, timeout {})",
        stats.retransmissions(),
        stats.nak_retransmissions,
        stats.timeout_retransmissions
    );
    if stats.abandoned_blocks > 0 {
        warn!("  Abandoned blocks: {}", stats.abandoned_blocks);
    }

    Ok(())
}
