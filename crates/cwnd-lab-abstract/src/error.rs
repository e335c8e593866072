use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid data rate {0:?}, expected e.g. \"1Mbps\", \"300Kbps\" or \"100bps\"")]
    InvalidRate(String),
    #[error(
        "unknown transport protocol {0:?}, expected one of TcpNewReno, TcpHybla, TcpVegas, TcpScalable, TcpWestwood"
    )]
    UnknownVariant(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("connection is not bound to a local endpoint")]
    NotBound,
    #[error("connection is not connected to a peer")]
    NotConnected,
    #[error("connection is already connected")]
    AlreadyConnected,
    #[error("connection is closed")]
    Closed,
}
