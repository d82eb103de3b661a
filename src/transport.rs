//! 전송 계층
//!
//! 송신 코어가 보는 것은 "그룹으로 데이터그램 전송"과
//! "피드백 데이터그램 수신" 두 가지뿐이다.

use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tokio::net::UdpSocket;
use tracing::info;

use crate::{Config, Result};

/// 비신뢰 데이터그램 전송 계층
pub trait Transport: Send + Sync {
    /// 그룹으로 데이터그램 전송
    fn send(&self, datagram: &[u8]) -> impl Future<Output = io::Result<usize>> + Send;

    /// 피드백 데이터그램 수신
    fn recv(&self, buf: &mut [u8]) -> impl Future<Output = io::Result<(usize, SocketAddr)>> + Send;
}

/// UDP 멀티캐스트 전송
pub struct MulticastTransport {
    socket: UdpSocket,
    destination: SocketAddr,
}

impl MulticastTransport {
    /// 설정에 따라 멀티캐스트 소켓 생성
    pub async fn bind(config: &Config) -> Result<Self> {
        let std_socket = Self::create_socket(config)?;
        let socket = UdpSocket::from_std(std_socket)?;
        let destination = config.group_socket_addr();

        info!(
            "Multicast transport bound on {} -> {}",
            socket.local_addr()?,
            destination
        );

        Ok(Self {
            socket,
            destination,
        })
    }

    /// 이미 바인딩된 소켓과 목적지로 생성 (유니캐스트 테스트용)
    pub fn from_socket(socket: UdpSocket, destination: SocketAddr) -> Self {
        Self {
            socket,
            destination,
        }
    }

    fn create_socket(config: &Config) -> io::Result<std::net::UdpSocket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        #[cfg(unix)]
        socket.set_reuse_port(true)?;
        socket.set_nonblocking(true)?;

        socket.set_multicast_ttl_v4(config.multicast_ttl)?;
        socket.set_multicast_loop_v4(config.multicast_loop)?;

        let interface = match config.bind_addr {
            SocketAddr::V4(addr) => *addr.ip(),
            SocketAddr::V6(_) => Ipv4Addr::UNSPECIFIED,
        };
        if !interface.is_unspecified() {
            socket.set_multicast_if_v4(&interface)?;
        }

        if config.join_group {
            socket.join_multicast_v4(&config.group_addr, &interface)?;
        }

        socket.bind(&SockAddr::from(config.bind_addr))?;

        Ok(socket.into())
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }
}

impl Transport for MulticastTransport {
    async fn send(&self, datagram: &[u8]) -> io::Result<usize> {
        self.socket.send_to(datagram, self.destination).await
    }

    async fn recv(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }
}
