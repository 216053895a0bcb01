use std::sync::Arc;
use std::time::Duration;

use embassy_futures::select::{select, Either};
use log::{debug, info, warn};

use crate::protocols::cppm::{DecodeEvent, PulseDecoder};
use crate::protocols::pwm::{CycleAssembler, Edge};
use crate::shared::{RcCounters, RcShared};
use crate::tools::blocking::block_on_timeout;

/// Decode worker: drains the edge queue into the cycle assembler and decoder
/// and queues every completed frame for the dispatcher.
pub fn decoder_task<D: PulseDecoder>(shared: Arc<RcShared>, mut decoder: D, wait: Duration) {
    let mut assembler = CycleAssembler::new();
    info!("RC decoder started ({} channels)", decoder.max_channels());

    while !shared.is_stopping() {
        let edge = match block_on_timeout(
            select(shared.edges.receive(), shared.decoder_stop.wait()),
            wait,
        ) {
            // nothing arrived, go round and check the stop flag
            None => continue,
            Some(Either::Second(())) => break,
            Some(Either::First(edge)) => edge,
        };

        handle_edge(&shared, &mut assembler, &mut decoder, edge);

        // catch up on whatever queued while we were busy
        while !shared.is_stopping() {
            let Ok(edge) = shared.edges.try_receive() else {
                break;
            };
            handle_edge(&shared, &mut assembler, &mut decoder, edge);
        }
    }

    decoder.reset();
    info!("RC decoder stopped");
}

fn handle_edge<D: PulseDecoder>(
    shared: &RcShared,
    assembler: &mut CycleAssembler,
    decoder: &mut D,
    edge: Edge,
) {
    let Some(cycle) = assembler.push(edge) else {
        return;
    };

    let counters = &shared.counters;
    match decoder.decode(&cycle) {
        DecodeEvent::Rejected => RcCounters::bump(&counters.cycles_rejected),
        DecodeEvent::Synced { .. } => RcCounters::bump(&counters.sync_count),
        DecodeEvent::Completed(frame) => {
            RcCounters::bump(&counters.frames_decoded);
            debug!("RC frame decoded: {}", frame);

            if shared.frames.try_send(frame).is_err() {
                RcCounters::bump(&counters.frames_dropped);
                warn!("RC frame queue full, frame dropped");
            }
        }
        DecodeEvent::Overflow => {
            RcCounters::bump(&counters.frames_dropped);
            warn!(
                "RC frame exceeded {} channels, dropped",
                decoder.max_channels()
            );
        }
        DecodeEvent::Ignored | DecodeEvent::Captured { .. } => {}
    }
}
