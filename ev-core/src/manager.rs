//! Vehicle manager (§4.6): owns the active decoder, the CAN/ISO-TP
//! manager, the single outstanding-response slot, and the pending
//! capability-mask flag.

use crate::broker::DataBroker;
use crate::decoder::VehicleDecoder;
use crate::error::TransportError;
use crate::isotp::CanManager;
use crate::transport::Transport;
use crate::types::CapabilityMask;
use smallvec::SmallVec;
use std::sync::Mutex;

struct PendingResponse {
    rsp_id: u32,
    data: SmallVec<[u8; 16]>,
}

/// Drives one vehicle's request/response cycle over one transport.
pub struct VehicleManager<T: Transport> {
    can: CanManager<T>,
    decoder: Box<dyn VehicleDecoder>,
    slot: Mutex<Option<PendingResponse>>,
    pending_mask: Mutex<Option<CapabilityMask>>,
}

impl<T: Transport> VehicleManager<T> {
    pub fn new(transport: T, mut decoder: Box<dyn VehicleDecoder>) -> Result<Self, TransportError> {
        let config = decoder.config().clone();
        let mut can = CanManager::new(transport);
        can.transport_mut().init(config.bitrate, config.req_timeout_ms)?;
        decoder.init()?;
        Ok(Self {
            can,
            decoder,
            slot: Mutex::new(None),
            pending_mask: Mutex::new(None),
        })
    }

    /// Ask the decoder to restrict its schedule to the given capability
    /// mask. Takes effect at the next `evaluate`.
    pub fn request_capabilities(&self, mask: CapabilityMask) {
        *self.pending_mask.lock().expect("manager mutex poisoned") = Some(mask);
    }

    /// Inbound frame path. May be called from a reader thread standing in
    /// for an interrupt context; never blocks.
    pub fn on_frame(&mut self, rsp_id: u32, data: &[u8]) {
        if let Some(reassembled) = self.can.receive(rsp_id, data) {
            let mut slot = self.slot.lock().expect("manager mutex poisoned");
            if slot.is_none() {
                *slot = Some(PendingResponse {
                    rsp_id,
                    data: reassembled,
                });
            }
            // Slot occupied: a response arrived before the evaluator
            // drained the previous one. Dropped, per the single-slot
            // contract.
        }
    }

    pub fn on_transport_error(&mut self, err: TransportError) {
        self.can.interface_error(err);
        self.decoder.note_error(err);
    }

    /// Periodic tick: drain any buffered response into the decoder,
    /// apply a pending mask update, then ask the decoder for its next
    /// request and transmit it.
    pub fn evaluate(&mut self, broker: &DataBroker) -> Result<(), TransportError> {
        loop {
            match self.can.transport_mut().try_recv_frame() {
                Ok(Some((rsp_id, data))) => self.on_frame(rsp_id, &data),
                Ok(None) => break,
                Err(err) => {
                    // The in-flight request's deadline passed with no
                    // response: clear it out so the round-robin can move
                    // on to the next request.
                    self.on_transport_error(err);
                    break;
                }
            }
        }

        let pending = self.slot.lock().expect("manager mutex poisoned").take();
        if let Some(PendingResponse { rsp_id, data }) = pending {
            self.decoder.rx_data(rsp_id, &data, broker);
        }

        if let Some(mask) = self.pending_mask.lock().expect("manager mutex poisoned").take() {
            self.decoder.set_request_mask(mask);
        }

        if let Some(req) = self.decoder.evaluate() {
            if let Err(err) = self.can.transmit(req.req_id, req.rsp_id, req.len, &req.payload) {
                // Transmit itself failed after the decoder already
                // marked the request in-flight; clear it immediately
                // instead of leaving the schedule wedged until a
                // deadline that was never armed.
                self.on_transport_error(err);
                return Err(err);
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn decoder_name(&self) -> &'static str {
        self.decoder.config().name
    }
}
