//! User-defined-proc wrapper.
//!
//! A UDP class packages a network fragment behind an ordinary class
//! surface: every wrapper variable proxies an inner `proc.var`. During
//! create the inner network is instantiated with the wrapper's variables
//! passed down, and each is wired to its proxied inner variable -
//! inner-to-outer for `out`-flagged variables, outer-to-inner for the
//! rest.

use crate::error::{Error, Result};
use crate::proc::{ExecState, ProcCtx, ProcImpl};
use crate::var::VarAddr;
use std::rc::Rc;

#[derive(Default)]
pub struct UserDefProc;

impl ProcImpl for UserDefProc {
    fn create(&mut self, ctx: &mut ProcCtx) -> Result<()> {
        let class = &ctx.classes.classes[ctx.proc().class_idx];
        let net_cfg = class.udp_network.clone().ok_or_else(|| {
            Error::invalid_state(format!(
                "the class '{}' is not a UDP class",
                class.label
            ))
        })?;

        // every any-channel wrapper var is a proxy candidate
        let proxy_vars: Vec<VarAddr> = ctx
            .proc()
            .vars
            .iter()
            .enumerate()
            .filter(|(_, v)| v.ch_idx.is_none())
            .map(|(vi, _)| VarAddr { proc: ctx.proc_idx, var: vi })
            .collect();

        ctx.create_internal_net(Rc::clone(&net_cfg), 1, &proxy_vars)?;
        Ok(())
    }

    fn exec(&mut self, ctx: &mut ProcCtx) -> Result<ExecState> {
        ctx.exec_internal_net()
    }
}
