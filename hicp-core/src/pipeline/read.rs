//! Reader task: turns wire frames into pipeline events.

use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;

use crate::codec::{Frame, HicpCodec};
use crate::pipeline::TimeCommand;
use crate::session::Session;

pub(crate) async fn run_reader<R>(
    mut stream: FramedRead<R, HicpCodec>,
    session: Session,
    time_tx: mpsc::UnboundedSender<TimeCommand>,
) where
    R: AsyncRead + Unpin,
{
    loop {
        match stream.next().await {
            Some(Ok(Frame::Message(msg))) => {
                // True means the client said goodbye.
                if session.dispatch_inbound(msg) {
                    break;
                }
            }
            Some(Ok(Frame::Disconnect)) | None => {
                session.dispatch_disconnect();
                break;
            }
            Some(Err(err)) => {
                tracing::error!(%err, "read failed, treating as disconnect");
                session.dispatch_disconnect();
                break;
            }
        }
    }
    // The timer has no reason to outlive the connection.
    let _ = time_tx.send(TimeCommand::Disconnect);
}
