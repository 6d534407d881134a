//! # Integration Flows
//!
//! Every test boots the example AIM on `127.0.0.1:0` and talks to it over
//! HTTP the way a node proxy would: requests are signed for
//! `/aim/<slot><uri>` and delivered to `<uri>`.

#[cfg(test)]
mod harness;

#[cfg(test)]
mod async_jobs;
#[cfg(test)]
mod signed_calls;
