//! In-process communicator connecting a group of worker threads.
//!
//! Members share a single rendezvous point. Each collective is two phases:
//! every member deposits its contribution and waits for the rest of the
//! group, then every member reads what it needs and waits again so that no
//! slot is overwritten before all peers have finished reading.
//!
//! The group is fail-stop. Dropping any member (normal early return or a
//! panic unwinding through the worker) aborts the group, and every blocked
//! or later collective on the remaining members returns
//! [`CommError::Aborted`].

use std::sync::Arc;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::communicator::{check_layout, CommError, CommInfo, CommKind, Communicator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Collective {
    Barrier,
    Broadcast,
    AllGatherF64,
    AllGatherU64,
    Scatter,
    Gather,
}

impl Collective {
    fn name(self) -> &'static str {
        match self {
            Collective::Barrier => "barrier",
            Collective::Broadcast => "broadcast",
            Collective::AllGatherF64 => "all_gather_f64",
            Collective::AllGatherU64 => "all_gather_u64",
            Collective::Scatter => "scatter_varcount",
            Collective::Gather => "gather_varcount",
        }
    }
}

enum Payload {
    Reals(Vec<f64>),
    Counts(Vec<u64>),
}

struct Contribution {
    op: Collective,
    payload: Option<Payload>,
}

impl Contribution {
    fn reals(&self) -> Result<&[f64], CommError> {
        match &self.payload {
            Some(Payload::Reals(v)) => Ok(v),
            _ => Err(CommError::Protocol(format!(
                "{} contribution carries no real payload",
                self.op.name()
            ))),
        }
    }

    fn counts(&self) -> Result<&[u64], CommError> {
        match &self.payload {
            Some(Payload::Counts(v)) => Ok(v),
            _ => Err(CommError::Protocol(format!(
                "{} contribution carries no integer payload",
                self.op.name()
            ))),
        }
    }
}

struct State {
    arrived: usize,
    generation: u64,
    aborted: bool,
    slots: Vec<Option<Contribution>>,
}

struct Rendezvous {
    size: usize,
    state: Mutex<State>,
    cvar: Condvar,
}

impl Rendezvous {
    /// Wait for all members to arrive. The lock is held on return.
    fn arrive(&self, state: &mut MutexGuard<'_, State>) -> Result<(), CommError> {
        if state.aborted {
            return Err(CommError::Aborted);
        }
        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.size {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.cvar.notify_all();
            return Ok(());
        }
        while state.generation == generation && !state.aborted {
            self.cvar.wait(state);
        }
        if state.generation == generation {
            Err(CommError::Aborted)
        } else {
            Ok(())
        }
    }
}

/// One member of an in-process worker group.
///
/// Create a whole group with [`LocalComm::group`] and move each member onto
/// its own thread. Members are not `Clone`: one member per worker.
pub struct LocalComm {
    rank: usize,
    shared: Arc<Rendezvous>,
}

impl LocalComm {
    /// Create `size` connected members, ordered by rank.
    pub fn group(size: usize) -> Result<Vec<LocalComm>, CommError> {
        if size == 0 {
            return Err(CommError::InvalidArgument(
                "a worker group needs at least one member".into(),
            ));
        }
        let shared = Arc::new(Rendezvous {
            size,
            state: Mutex::new(State {
                arrived: 0,
                generation: 0,
                aborted: false,
                slots: (0..size).map(|_| None).collect(),
            }),
            cvar: Condvar::new(),
        });
        log::debug!("created local worker group of {}", size);
        Ok((0..size)
            .map(|rank| LocalComm {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect())
    }

    /// Run one collective: deposit `payload`, wait, `read` all slots, wait.
    fn exchange<R>(
        &self,
        op: Collective,
        payload: Option<Payload>,
        read: impl FnOnce(&[Option<Contribution>]) -> Result<R, CommError>,
    ) -> Result<R, CommError> {
        let shared = &*self.shared;
        let mut state = shared.state.lock();
        state.slots[self.rank] = Some(Contribution { op, payload });
        shared.arrive(&mut state)?;

        let result = check_order(&state.slots, op).and_then(|()| read(&state.slots));

        shared.arrive(&mut state)?;
        result
    }
}

fn check_order(slots: &[Option<Contribution>], op: Collective) -> Result<(), CommError> {
    for (rank, slot) in slots.iter().enumerate() {
        match slot {
            Some(c) if c.op == op => {}
            Some(c) => {
                log::warn!(
                    "worker {} called {} while peers called {}",
                    rank,
                    c.op.name(),
                    op.name()
                );
                return Err(CommError::OutOfOrder {
                    rank,
                    expected: op.name(),
                    found: c.op.name(),
                });
            }
            None => {
                return Err(CommError::Protocol(format!(
                    "worker {} left no contribution to {}",
                    rank,
                    op.name()
                )))
            }
        }
    }
    Ok(())
}

fn slot(slots: &[Option<Contribution>], rank: usize) -> Result<&Contribution, CommError> {
    slots
        .get(rank)
        .and_then(Option::as_ref)
        .ok_or_else(|| CommError::Protocol(format!("missing contribution from worker {}", rank)))
}

impl Drop for LocalComm {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.aborted = true;
        self.shared.cvar.notify_all();
    }
}

impl Communicator for LocalComm {
    fn info(&self) -> CommInfo {
        CommInfo {
            name: format!("local threads ({} workers)", self.shared.size),
            kind: CommKind::Threads,
            rank: self.rank,
            size: self.shared.size,
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn barrier(&self) -> Result<(), CommError> {
        self.exchange(Collective::Barrier, None, |_| Ok(()))
    }

    fn broadcast(&self, buf: &mut [f64], root: usize) -> Result<(), CommError> {
        if root >= self.size() {
            return Err(CommError::InvalidArgument(format!(
                "broadcast root {} out of range",
                root
            )));
        }
        let payload = (self.rank == root).then(|| Payload::Reals(buf.to_vec()));
        let is_root = self.rank == root;
        self.exchange(Collective::Broadcast, payload, |slots| {
            if is_root {
                return Ok(());
            }
            let data = slot(slots, root)?.reals()?;
            if data.len() != buf.len() {
                return Err(CommError::Protocol(format!(
                    "broadcast length mismatch: root sent {}, receiver expects {}",
                    data.len(),
                    buf.len()
                )));
            }
            buf.copy_from_slice(data);
            Ok(())
        })
    }

    fn all_gather_f64(&self, value: f64) -> Result<Vec<f64>, CommError> {
        self.exchange(
            Collective::AllGatherF64,
            Some(Payload::Reals(vec![value])),
            |slots| {
                (0..slots.len())
                    .map(|rank| {
                        slot(slots, rank)?.reals()?.first().copied().ok_or_else(|| {
                            CommError::Protocol(format!("empty contribution from worker {}", rank))
                        })
                    })
                    .collect()
            },
        )
    }

    fn all_gather_u64(&self, values: &[u64]) -> Result<Vec<u64>, CommError> {
        let width = values.len();
        self.exchange(
            Collective::AllGatherU64,
            Some(Payload::Counts(values.to_vec())),
            |slots| {
                let mut out = Vec::with_capacity(width * slots.len());
                for rank in 0..slots.len() {
                    let part = slot(slots, rank)?.counts()?;
                    if part.len() != width {
                        return Err(CommError::Protocol(format!(
                            "worker {} contributed {} values, expected {}",
                            rank,
                            part.len(),
                            width
                        )));
                    }
                    out.extend_from_slice(part);
                }
                Ok(out)
            },
        )
    }

    fn scatter_varcount(
        &self,
        send: Option<&[f64]>,
        counts: &[usize],
        displs: &[usize],
        recv: &mut [f64],
        root: usize,
    ) -> Result<(), CommError> {
        check_layout(counts, displs, self.size(), root)?;
        let payload = if self.rank == root {
            let send = send.ok_or_else(|| {
                CommError::InvalidArgument("scatter root has no send buffer".into())
            })?;
            Some(Payload::Reals(send.to_vec()))
        } else {
            None
        };
        let (start, count) = (displs[self.rank], counts[self.rank]);
        self.exchange(Collective::Scatter, payload, |slots| {
            let data = slot(slots, root)?.reals()?;
            let segment = data.get(start..start + count).ok_or_else(|| {
                CommError::Protocol(format!(
                    "scatter segment {}..{} exceeds send buffer of {}",
                    start,
                    start + count,
                    data.len()
                ))
            })?;
            if recv.len() != count {
                return Err(CommError::Protocol(format!(
                    "scatter receive buffer holds {}, expected {}",
                    recv.len(),
                    count
                )));
            }
            recv.copy_from_slice(segment);
            Ok(())
        })
    }

    fn gather_varcount(
        &self,
        send: &[f64],
        recv: Option<&mut [f64]>,
        counts: &[usize],
        displs: &[usize],
        root: usize,
    ) -> Result<(), CommError> {
        check_layout(counts, displs, self.size(), root)?;
        let is_root = self.rank == root;
        let mut recv = if is_root {
            Some(recv.ok_or_else(|| {
                CommError::InvalidArgument("gather root has no receive buffer".into())
            })?)
        } else {
            None
        };
        self.exchange(
            Collective::Gather,
            Some(Payload::Reals(send.to_vec())),
            |slots| {
                let Some(recv) = recv.as_deref_mut() else {
                    return Ok(());
                };
                for rank in 0..slots.len() {
                    let part = slot(slots, rank)?.reals()?;
                    let (start, count) = (displs[rank], counts[rank]);
                    if part.len() != count {
                        return Err(CommError::Protocol(format!(
                            "worker {} sent {} values, expected {}",
                            rank,
                            part.len(),
                            count
                        )));
                    }
                    let target = recv.get_mut(start..start + count).ok_or_else(|| {
                        CommError::Protocol(format!(
                            "gather segment {}..{} exceeds receive buffer",
                            start,
                            start + count
                        ))
                    })?;
                    target.copy_from_slice(part);
                }
                Ok(())
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Run `f` on every member of a fresh group and return results by rank.
    fn run_group<T: Send>(
        size: usize,
        f: impl Fn(&LocalComm) -> T + Sync,
    ) -> Vec<T> {
        let group = LocalComm::group(size).unwrap();
        std::thread::scope(|s| {
            let handles: Vec<_> = group
                .into_iter()
                .map(|comm| {
                    let f = &f;
                    s.spawn(move || f(&comm))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
    }

    #[test]
    fn test_empty_group_rejected() {
        assert!(matches!(
            LocalComm::group(0),
            Err(CommError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_broadcast_from_non_zero_root() {
        let out = run_group(4, |comm| {
            let mut buf = if comm.rank() == 2 {
                vec![1.5, -2.0, 3.25]
            } else {
                vec![0.0; 3]
            };
            comm.broadcast(&mut buf, 2).unwrap();
            buf
        });
        for buf in out {
            assert_eq!(buf, vec![1.5, -2.0, 3.25]);
        }
    }

    #[test]
    fn test_all_gather_orders_by_rank() {
        let out = run_group(3, |comm| comm.all_gather_f64(comm.rank() as f64 * 10.0).unwrap());
        for values in out {
            assert_eq!(values, vec![0.0, 10.0, 20.0]);
        }

        let out = run_group(3, |comm| {
            let r = comm.rank() as u64;
            comm.all_gather_u64(&[r, r + 100]).unwrap()
        });
        for values in out {
            assert_eq!(values, vec![0, 100, 1, 101, 2, 102]);
        }
    }

    #[test]
    fn test_scatter_then_gather_restores_buffer() {
        let counts = [1, 2, 3];
        let displs = [0, 1, 3];
        let source: Vec<f64> = (0..6).map(|i| i as f64 + 0.5).collect();

        let out = run_group(3, |comm| {
            let mut local = vec![0.0; counts[comm.rank()]];
            let send = (comm.rank() == 0).then_some(source.as_slice());
            comm.scatter_varcount(send, &counts, &displs, &mut local, 0)
                .unwrap();
            let scattered = local.clone();

            let mut gathered = vec![0.0; 6];
            let recv = (comm.rank() == 0).then_some(gathered.as_mut_slice());
            comm.gather_varcount(&local, recv, &counts, &displs, 0)
                .unwrap();
            (scattered, gathered)
        });

        assert_eq!(out[0].0, vec![0.5]);
        assert_eq!(out[1].0, vec![1.5, 2.5]);
        assert_eq!(out[2].0, vec![3.5, 4.5, 5.5]);
        assert_eq!(out[0].1, source);
    }

    #[test]
    fn test_mismatched_collectives_fail_instead_of_hanging() {
        let out = run_group(2, |comm| {
            if comm.rank() == 0 {
                comm.barrier().map(|_| ())
            } else {
                let mut buf = [0.0];
                comm.broadcast(&mut buf, 1)
            }
        });
        for result in out {
            assert!(matches!(result, Err(CommError::OutOfOrder { .. })));
        }
    }

    #[test]
    fn test_departed_member_aborts_peers() {
        let out = run_group(3, |comm| {
            if comm.rank() == 1 {
                // Leaves without joining the barrier; the group member is
                // dropped when the closure's caller finishes with it.
                return Ok(());
            }
            comm.barrier()
        });
        assert!(out[1].is_ok());
        assert!(matches!(out[0], Err(CommError::Aborted)));
        assert!(matches!(out[2], Err(CommError::Aborted)));
    }

    #[test]
    fn test_single_member_group() {
        let out = run_group(1, |comm| {
            comm.barrier().unwrap();
            comm.all_gather_f64(7.0).unwrap()
        });
        assert_eq!(out, vec![vec![7.0]]);
        let info = LocalComm::group(1).unwrap().remove(0).info();
        assert_eq!(info.kind, CommKind::Threads);
        assert_eq!(info.size, 1);
    }
}
