//! Writer task: drains outbound messages into the socket.

use futures::SinkExt;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::codec::FramedWrite;

use crate::codec::HicpCodec;
use crate::pipeline::WriteCommand;

pub(crate) async fn run_writer<W>(
    mut sink: FramedWrite<W, HicpCodec>,
    mut rx: mpsc::UnboundedReceiver<WriteCommand>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(command) = rx.recv().await {
        match command {
            WriteCommand::Message(msg) => {
                if let Err(err) = sink.send(msg).await {
                    tracing::error!(%err, "write failed, stopping writer");
                    return;
                }
            }
            WriteCommand::Shutdown => break,
        }
    }
    let _ = sink.flush().await;
}
