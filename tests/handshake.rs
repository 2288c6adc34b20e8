mod common;

use common::{feed, globals, xdg_window, Call, MockPresenter, Recorder, Request};
use wlboot::{
    backend::{BufferId, Presented},
    config::{BackendKind, ShellPreference, WindowConfig},
    utils::Size,
    wayland::{
        handshake::{Control, Event, Sequencer, SurfaceState},
        registry::{BindRequest, Interface, ShellKind},
    },
    Error,
};

#[test]
fn binds_only_wanted_interfaces() {
    let advertised = [
        (1, "wl_compositor", 6),
        (2, "wl_seat", 7),
        (3, "wl_shm", 1),
        (4, "xdg_wm_base", 5),
        (5, "wl_output", 4),
        (6, "wl_shell", 1),
        (7, "wl_compositor", 6),
    ];

    let mut egl = Sequencer::new(WindowConfig::default().with_backend(BackendKind::Egl));
    let mut recorder = Recorder::default();
    feed(&mut egl, &mut recorder, globals(&advertised));
    assert_eq!(
        recorder.binds(),
        vec![
            BindRequest {
                name: 1,
                interface: Interface::Compositor,
                version: 4
            },
            BindRequest {
                name: 4,
                interface: Interface::XdgWmBase,
                version: 1
            },
            BindRequest {
                name: 6,
                interface: Interface::WlShell,
                version: 1
            },
        ]
    );

    let config = WindowConfig::default()
        .with_backend(BackendKind::Shm)
        .with_shell(ShellPreference::Xdg);
    let mut shm = Sequencer::new(config);
    let mut recorder = Recorder::default();
    feed(&mut shm, &mut recorder, globals(&advertised));
    let bound: Vec<_> = recorder.binds().into_iter().map(|bind| bind.interface).collect();
    assert_eq!(bound, vec![Interface::Compositor, Interface::Shm, Interface::XdgWmBase]);
}

#[test]
fn unrelated_globals_only_means_no_compositor() {
    let mut sequencer = Sequencer::new(WindowConfig::default());
    let mut recorder = Recorder::default();
    feed(&mut sequencer, &mut recorder, globals(&[(1, "wl_seat", 7)]));

    assert!(recorder.requests.is_empty());
    assert!(matches!(sequencer.finish_registry(), Err(Error::NoCompositor)));
    assert_eq!(sequencer.state(), SurfaceState::Unbound);
}

#[test]
fn missing_shell_is_reported() {
    let mut sequencer = Sequencer::new(WindowConfig::default().with_shell(ShellPreference::Xdg));
    let mut recorder = Recorder::default();
    feed(
        &mut sequencer,
        &mut recorder,
        globals(&[(1, "wl_compositor", 4), (2, "wl_shell", 1)]),
    );

    match sequencer.finish_registry() {
        Err(Error::NoShell(candidates)) => assert_eq!(candidates, &["xdg_wm_base"]),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn nothing_is_presented_before_configure() {
    let (mut sequencer, mut recorder) = xdg_window(WindowConfig::default());
    assert_eq!(sequencer.state(), SurfaceState::AwaitingConfigure);
    assert_eq!(
        recorder.take().last(),
        Some(&Request::CreateWindow(ShellKind::Xdg, String::from("wlboot")))
    );

    let (presenter, log) = MockPresenter::new();
    sequencer.attach_presenter(Box::new(presenter), &mut recorder).unwrap();
    assert!(matches!(sequencer.present(&mut recorder), Err(Error::NotConfigured)));

    feed(&mut sequencer, &mut recorder, vec![Event::Frame { time: 16 }]);
    assert_eq!(*log.borrow(), vec![Call::Init(Size::new(1280, 720))]);
    assert!(recorder.requests.is_empty());

    feed(&mut sequencer, &mut recorder, vec![Event::SurfaceConfigure { serial: 3 }]);
    assert_eq!(sequencer.state(), SurfaceState::Configured);
    assert_eq!(
        recorder.take(),
        vec![Request::AckConfigure(3), Request::Frame, Request::Commit]
    );
    assert_eq!(log.borrow().last(), Some(&Call::Present));
}

#[test]
fn presenter_without_window_is_rejected() {
    let mut sequencer = Sequencer::new(WindowConfig::default());
    let mut recorder = Recorder::default();
    let (presenter, _log) = MockPresenter::new();

    assert!(matches!(
        sequencer.attach_presenter(Box::new(presenter), &mut recorder),
        Err(Error::InvalidState {
            operation: "attach_presenter",
            state: SurfaceState::Unbound,
        })
    ));
    assert!(matches!(
        sequencer.create_window(&mut recorder),
        Err(Error::InvalidState { .. })
    ));
}

#[test]
fn pings_are_answered_first_and_once() {
    let (mut sequencer, mut recorder) = xdg_window(WindowConfig::default());
    let (presenter, _log) = MockPresenter::new();
    sequencer.attach_presenter(Box::new(presenter), &mut recorder).unwrap();
    recorder.take();

    let ping = |serial| Event::Ping {
        source: ShellKind::Xdg,
        serial,
    };

    feed(&mut sequencer, &mut recorder, vec![ping(41)]);
    assert_eq!(recorder.take(), vec![Request::Pong(ShellKind::Xdg, 41)]);

    feed(
        &mut sequencer,
        &mut recorder,
        vec![ping(42), Event::SurfaceConfigure { serial: 1 }, ping(43)],
    );
    let requests = recorder.take();
    assert_eq!(requests.first(), Some(&Request::Pong(ShellKind::Xdg, 42)));
    assert_eq!(requests.last(), Some(&Request::Pong(ShellKind::Xdg, 43)));
    assert_eq!(
        requests
            .iter()
            .filter(|request| matches!(request, Request::Pong(..)))
            .count(),
        2
    );

    sequencer.shutdown(&mut recorder);
    recorder.take();
    feed(&mut sequencer, &mut recorder, vec![ping(44)]);
    assert!(recorder.requests.is_empty());
}

#[test]
fn configure_resizes_before_next_present() {
    let (mut sequencer, mut recorder) = xdg_window(WindowConfig::default());
    let (presenter, log) = MockPresenter::new();
    sequencer.attach_presenter(Box::new(presenter), &mut recorder).unwrap();

    feed(
        &mut sequencer,
        &mut recorder,
        vec![
            Event::ToplevelConfigure {
                size: Some(Size::new(800, 600)),
            },
            Event::SurfaceConfigure { serial: 10 },
        ],
    );

    assert_eq!(sequencer.size(), Size::new(800, 600));
    assert_eq!(
        *log.borrow(),
        vec![
            Call::Init(Size::new(1280, 720)),
            Call::Resize(Size::new(800, 600)),
            Call::Present,
        ]
    );
}

#[test]
fn pending_size_waits_for_surface_configure() {
    let (mut sequencer, mut recorder) = xdg_window(WindowConfig::default());
    let (presenter, log) = MockPresenter::new();
    sequencer.attach_presenter(Box::new(presenter), &mut recorder).unwrap();
    feed(&mut sequencer, &mut recorder, vec![Event::SurfaceConfigure { serial: 1 }]);
    log.borrow_mut().clear();

    feed(
        &mut sequencer,
        &mut recorder,
        vec![Event::ToplevelConfigure {
            size: Some(Size::new(640, 480)),
        }],
    );
    assert_eq!(sequencer.size(), Size::new(1280, 720));
    assert!(log.borrow().is_empty());

    // a zero sized configure does not override the pending size
    feed(
        &mut sequencer,
        &mut recorder,
        vec![
            Event::ToplevelConfigure { size: None },
            Event::SurfaceConfigure { serial: 2 },
            Event::Frame { time: 32 },
        ],
    );
    assert_eq!(sequencer.size(), Size::new(640, 480));
    assert_eq!(*log.borrow(), vec![Call::Resize(Size::new(640, 480)), Call::Present]);
}

#[test]
fn wl_shell_needs_no_acknowledgement() {
    let config = WindowConfig::default()
        .with_backend(BackendKind::Egl)
        .with_shell(ShellPreference::WlShell)
        .with_title("legacy");
    let mut sequencer = Sequencer::new(config);
    let mut recorder = Recorder::default();
    feed(
        &mut sequencer,
        &mut recorder,
        globals(&[(1, "wl_compositor", 3), (2, "xdg_wm_base", 1), (3, "wl_shell", 1)]),
    );
    assert_eq!(sequencer.finish_registry().unwrap(), ShellKind::WlShell);
    assert!(!sequencer.globals().is_bound(Interface::XdgWmBase));

    sequencer.create_window(&mut recorder).unwrap();
    assert_eq!(sequencer.state(), SurfaceState::Configured);

    let (presenter, log) = MockPresenter::new();
    sequencer.attach_presenter(Box::new(presenter), &mut recorder).unwrap();
    assert_eq!(*log.borrow(), vec![Call::Init(Size::new(1280, 720)), Call::Present]);

    recorder.take();
    feed(
        &mut sequencer,
        &mut recorder,
        vec![
            Event::Ping {
                source: ShellKind::WlShell,
                serial: 5,
            },
            Event::ShellSurfaceConfigure {
                size: Some(Size::new(300, 200)),
            },
        ],
    );
    assert_eq!(recorder.take(), vec![Request::Pong(ShellKind::WlShell, 5)]);
    assert_eq!(log.borrow().last(), Some(&Call::Resize(Size::new(300, 200))));
}

#[test]
fn close_exits_the_loop() {
    let (mut sequencer, mut recorder) = xdg_window(WindowConfig::default());
    let controls = feed(
        &mut sequencer,
        &mut recorder,
        vec![Event::SurfaceConfigure { serial: 1 }, Event::Close],
    );
    assert_eq!(controls, vec![Control::Continue, Control::Exit]);

    // the loop stops after the close, pings arriving meanwhile are still answered
    recorder.take();
    assert!(Event::Ping {
        source: ShellKind::Xdg,
        serial: 9
    }
    .needs_reply());
    feed(
        &mut sequencer,
        &mut recorder,
        vec![Event::Ping {
            source: ShellKind::Xdg,
            serial: 9,
        }],
    );
    assert_eq!(recorder.take(), vec![Request::Pong(ShellKind::Xdg, 9)]);
}

#[test]
fn configure_axes_are_applied_independently() {
    let (mut sequencer, mut recorder) = xdg_window(WindowConfig::default());
    let (presenter, log) = MockPresenter::new();
    sequencer.attach_presenter(Box::new(presenter), &mut recorder).unwrap();

    feed(
        &mut sequencer,
        &mut recorder,
        vec![
            Event::ToplevelConfigure {
                size: Size::from_configure(800, 0),
            },
            Event::SurfaceConfigure { serial: 1 },
        ],
    );
    assert_eq!(sequencer.size(), Size::new(800, 720));

    feed(
        &mut sequencer,
        &mut recorder,
        vec![
            Event::ToplevelConfigure {
                size: Size::from_configure(0, 500),
            },
            Event::SurfaceConfigure { serial: 2 },
        ],
    );
    assert_eq!(sequencer.size(), Size::new(800, 500));
    assert_eq!(
        *log.borrow(),
        vec![
            Call::Init(Size::new(1280, 720)),
            Call::Resize(Size::new(800, 720)),
            Call::Present,
            Call::Resize(Size::new(800, 500)),
        ]
    );
}

#[test]
fn skipped_frames_resume_on_release() {
    let (mut sequencer, mut recorder) = xdg_window(WindowConfig::default());
    let (presenter, log) = MockPresenter::new();
    let skip = presenter.skip_switch();
    sequencer.attach_presenter(Box::new(presenter), &mut recorder).unwrap();
    feed(&mut sequencer, &mut recorder, vec![Event::SurfaceConfigure { serial: 1 }]);

    *skip.borrow_mut() = true;
    assert_eq!(sequencer.present(&mut recorder).unwrap(), Presented::Skipped);
    *skip.borrow_mut() = false;
    log.borrow_mut().clear();

    let buffer = BufferId {
        generation: 1,
        slot: 0,
    };
    feed(&mut sequencer, &mut recorder, vec![Event::BufferReleased(buffer)]);
    assert_eq!(*log.borrow(), vec![Call::Release(buffer), Call::Present]);

    // not starved anymore, a release alone does not present
    log.borrow_mut().clear();
    feed(&mut sequencer, &mut recorder, vec![Event::BufferReleased(buffer)]);
    assert_eq!(*log.borrow(), vec![Call::Release(buffer)]);
}

#[test]
fn shutdown_drops_presenter_first_and_is_idempotent() {
    let (mut sequencer, mut recorder) = xdg_window(WindowConfig::default());
    let (presenter, log) = MockPresenter::new();
    sequencer.attach_presenter(Box::new(presenter), &mut recorder).unwrap();
    recorder.take();

    sequencer.shutdown(&mut recorder);
    assert_eq!(sequencer.state(), SurfaceState::Destroyed);
    assert!(!sequencer.has_presenter());
    assert_eq!(log.borrow().last(), Some(&Call::Finish));
    assert_eq!(
        recorder.take(),
        vec![Request::DestroyBuffers, Request::DestroyWindow]
    );

    sequencer.shutdown(&mut recorder);
    assert!(recorder.requests.is_empty());
    assert!(matches!(sequencer.present(&mut recorder), Err(Error::NotConfigured)));
}

#[test]
fn shutdown_before_window_sends_nothing() {
    let mut sequencer = Sequencer::new(WindowConfig::default());
    let mut recorder = Recorder::default();
    sequencer.shutdown(&mut recorder);
    assert_eq!(sequencer.state(), SurfaceState::Destroyed);
    assert!(recorder.requests.is_empty());
}

#[cfg(feature = "backend_shm")]
mod shm {
    use std::{fs::File, os::unix::fs::FileExt};

    use super::*;
    use wlboot::backend::shm::ShmPresenter;
    use wayland_client::protocol::wl_shm::Format;

    fn shm_window(dir: &std::path::Path) -> (Sequencer, Recorder) {
        let config = WindowConfig {
            runtime_dir: Some(dir.to_path_buf()),
            ..WindowConfig::default()
        }
        .with_backend(BackendKind::Shm)
        .with_size((4, 3));
        let (mut sequencer, mut recorder) = xdg_window(config);
        feed(
            &mut sequencer,
            &mut recorder,
            vec![Event::ShmFormat(Format::Xrgb8888), Event::ShmFormat(Format::Argb8888)],
        );
        let presenter = ShmPresenter::new(Some(dir.to_path_buf()), sequencer.formats());
        assert_eq!(presenter.format(), Format::Xrgb8888);
        sequencer.attach_presenter(Box::new(presenter), &mut recorder).unwrap();
        (sequencer, recorder)
    }

    fn read_slot(recorder: &Recorder, slot: usize) -> Vec<u8> {
        let (fd, layouts) = recorder.pools.last().unwrap();
        let file = File::from(fd.try_clone().unwrap());
        let layout = layouts[slot];
        let mut bytes = vec![0; (layout.stride * layout.height) as usize];
        file.read_exact_at(&mut bytes, layout.offset as u64).unwrap();
        bytes
    }

    #[test]
    fn attached_buffers_are_never_painted() {
        let dir = tempfile::tempdir().unwrap();
        let (mut sequencer, mut recorder) = shm_window(dir.path());
        assert!(matches!(recorder.requests.last(), Some(Request::CreateBuffers(layouts)) if layouts.len() == 2));

        feed(&mut sequencer, &mut recorder, vec![Event::SurfaceConfigure { serial: 1 }]);
        let first = BufferId {
            generation: 1,
            slot: 0,
        };
        assert_eq!(recorder.attached(), vec![first]);
        // xrgb: 0xFFFFFF - 0, full height on the first frame
        let painted = read_slot(&recorder, 0);
        assert_eq!(&painted[..4], &0x00FF_FFFFu32.to_le_bytes());
        assert_eq!(&painted[painted.len() - 4..], &0x00FF_FFFFu32.to_le_bytes());

        feed(&mut sequencer, &mut recorder, vec![Event::Frame { time: 16 }]);
        assert_eq!(recorder.attached().len(), 2);

        // both buffers are held by the compositor now
        recorder.take();
        feed(&mut sequencer, &mut recorder, vec![Event::Frame { time: 32 }]);
        assert!(recorder.requests.is_empty());
        assert_eq!(read_slot(&recorder, 0), painted);

        feed(&mut sequencer, &mut recorder, vec![Event::BufferReleased(first)]);
        assert_eq!(recorder.attached(), vec![first]);
        assert_ne!(read_slot(&recorder, 0), painted);
    }

    #[test]
    fn resize_reallocates_and_ignores_stale_releases() {
        let dir = tempfile::tempdir().unwrap();
        let (mut sequencer, mut recorder) = shm_window(dir.path());
        feed(
            &mut sequencer,
            &mut recorder,
            vec![Event::SurfaceConfigure { serial: 1 }, Event::Frame { time: 16 }],
        );
        recorder.take();

        feed(
            &mut sequencer,
            &mut recorder,
            vec![
                Event::ToplevelConfigure {
                    size: Some(Size::new(8, 2)),
                },
                Event::SurfaceConfigure { serial: 2 },
            ],
        );
        let requests = recorder.take();
        assert_eq!(requests[0], Request::AckConfigure(2));
        assert_eq!(requests[1], Request::DestroyBuffers);
        match &requests[2] {
            Request::CreateBuffers(layouts) => {
                assert!(layouts.iter().all(|layout| layout.id.generation == 2));
                assert!(layouts.iter().all(|layout| layout.width == 8 && layout.height == 2));
            }
            other => panic!("expected new buffers, got {:?}", other),
        }

        feed(
            &mut sequencer,
            &mut recorder,
            vec![Event::BufferReleased(BufferId {
                generation: 1,
                slot: 0,
            })],
        );
        assert!(recorder.requests.is_empty());

        feed(&mut sequencer, &mut recorder, vec![Event::Frame { time: 48 }]);
        assert_eq!(
            recorder.attached(),
            vec![BufferId {
                generation: 2,
                slot: 0
            }]
        );
    }

    fn last_damage_height(recorder: &Recorder) -> usize {
        recorder
            .requests
            .iter()
            .rev()
            .find_map(|request| match request {
                Request::Damage(rect) => {
                    assert_eq!((rect.x, rect.y, rect.width), (0, 0, 4));
                    Some(rect.height as usize)
                }
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn consecutive_commits_only_differ_inside_the_damage() {
        const STRIDE: usize = 4 * 4;

        let dir = tempfile::tempdir().unwrap();
        let (mut sequencer, mut recorder) = shm_window(dir.path());
        recorder.take();

        let mut commits = Vec::new();
        feed(&mut sequencer, &mut recorder, vec![Event::SurfaceConfigure { serial: 1 }]);
        commits.push((read_slot(&recorder, 0), last_damage_height(&recorder)));

        feed(&mut sequencer, &mut recorder, vec![Event::Frame { time: 16 }]);
        commits.push((read_slot(&recorder, 1), last_damage_height(&recorder)));

        feed(
            &mut sequencer,
            &mut recorder,
            vec![
                Event::BufferReleased(BufferId {
                    generation: 1,
                    slot: 0,
                }),
                Event::Frame { time: 32 },
            ],
        );
        commits.push((read_slot(&recorder, 0), last_damage_height(&recorder)));

        let heights: Vec<_> = commits.iter().map(|(_, height)| *height).collect();
        assert_eq!(heights, vec![3, 2, 1]);

        for pair in commits.windows(2) {
            let (previous, _) = &pair[0];
            let (current, damaged) = &pair[1];
            assert_eq!(
                &current[damaged * STRIDE..],
                &previous[damaged * STRIDE..],
                "rows outside the damage changed"
            );
            assert_ne!(&current[..damaged * STRIDE], &previous[..damaged * STRIDE]);
        }
        for (contents, _) in &commits {
            assert!(contents
                .chunks_exact(STRIDE)
                .all(|row| row.iter().any(|byte| *byte != 0)));
        }
    }

    #[test]
    fn missing_runtime_dir_fails_allocation() {
        let (mut sequencer, mut recorder) = xdg_window(WindowConfig::default().with_backend(BackendKind::Shm));
        let presenter = ShmPresenter::new(None, &[]);
        assert!(matches!(
            sequencer.attach_presenter(Box::new(presenter), &mut recorder),
            Err(Error::NoRuntimeDir)
        ));
        assert!(!sequencer.has_presenter());
    }
}
