//! End-to-end program loop scenarios on the headless surface.

use canopy_core::{Event, Fact, Handler, VNode};
use canopy_render::HeadlessDom;
use canopy_runtime::{Cmd, Model, Program, ProgramConfig};
use pretty_assertions::assert_eq;

#[derive(Debug, Clone, PartialEq)]
enum Msg {
    Inc,
    Add(i32),
    Load,
    Quit,
}

struct Counter {
    count: i32,
    updates: usize,
    // Shared across views so the click fact diffs as unchanged.
    on_click: Handler<Msg>,
}

impl Counter {
    fn new() -> Self {
        Self {
            count: 0,
            updates: 0,
            on_click: Handler::message(Msg::Inc),
        }
    }
}

impl Model for Counter {
    type Message = Msg;

    fn update(&mut self, msg: Msg) -> Cmd<Msg> {
        self.updates += 1;
        match msg {
            Msg::Inc => self.count += 1,
            Msg::Add(n) => self.count += n,
            Msg::Load => return Cmd::task(|| Msg::Add(10)),
            Msg::Quit => return Cmd::quit(),
        }
        Cmd::none()
    }

    fn view(&self) -> VNode<Msg> {
        VNode::element(
            "div",
            [],
            vec![
                VNode::element("button", [Fact::on("click", self.on_click.clone())], vec![]),
                VNode::element("span", [], vec![VNode::text(self.count.to_string())]),
            ],
        )
    }
}

fn started(config: ProgramConfig) -> Program<Counter, HeadlessDom<Msg>> {
    let mut program = Program::with_config(Counter::new(), HeadlessDom::new(), config);
    program.init().expect("init");
    program.surface_mut().reset_stats();
    program
}

fn markup(program: &Program<Counter, HeadlessDom<Msg>>) -> String {
    let root = program.root().expect("mounted");
    program.surface().to_markup(root)
}

#[test]
fn init_mounts_first_view() {
    let program = started(ProgramConfig::default());
    assert_eq!(markup(&program), "<div><button @click></button><span>0</span></div>");
}

#[test]
fn queued_messages_coalesce_into_one_render() {
    let mut program = started(ProgramConfig::default());
    for _ in 0..5 {
        program.send(Msg::Inc);
    }

    let r = program.step().expect("step");
    assert_eq!(r.messages_processed, 5);
    assert!(r.rendered);
    assert_eq!(r.patches, 1);
    assert_eq!(r.frame_idx, 1);
    assert_eq!(program.surface().stats().text_writes, 1);
    assert_eq!(markup(&program), "<div><button @click></button><span>5</span></div>");
}

#[test]
fn clean_step_skips_render_unless_configured() {
    let mut program = started(ProgramConfig::default());
    let r = program.step().expect("step");
    assert!(!r.rendered);
    assert_eq!(r.frame_idx, 0);

    let mut program = started(ProgramConfig::default().with_render_when_clean(true));
    let r = program.step().expect("step");
    assert!(r.rendered);
    assert_eq!(r.patches, 0);
    assert_eq!(r.frame_idx, 1);
}

#[test]
fn message_bound_defers_the_rest() {
    let mut program = started(ProgramConfig::default().with_max_messages_per_step(2));
    for _ in 0..5 {
        program.send(Msg::Inc);
    }
    assert_eq!(program.step().expect("step").messages_processed, 2);
    assert_eq!(program.queue().len(), 3);
    assert_eq!(program.run_until_idle(10).expect("run"), 2);
    assert_eq!(program.model().count, 5);
}

#[test]
fn tasks_run_on_the_following_step() {
    let mut program = started(ProgramConfig::default());
    program.send(Msg::Load);
    let r = program.step().expect("step");
    assert_eq!(r.messages_processed, 1);
    assert_eq!(program.model().count, 0);
    assert!(program.has_pending_work());

    let r = program.step().expect("step");
    assert_eq!(r.messages_processed, 1);
    assert_eq!(program.model().count, 10);
    assert_eq!(markup(&program), "<div><button @click></button><span>10</span></div>");
}

#[test]
fn quit_leaves_surface_as_last_rendered() {
    let mut program = started(ProgramConfig::default());
    program.send(Msg::Inc);
    program.step().expect("step");
    program.send(Msg::Quit);
    program.send(Msg::Inc);

    let r = program.step().expect("step");
    assert!(!r.running);
    assert!(!program.is_running());
    assert_eq!(program.model().count, 1);
    assert_eq!(program.model().updates, 2);
    assert_eq!(markup(&program), "<div><button @click></button><span>1</span></div>");
}

#[test]
fn dispatched_events_queue_messages() {
    let mut program = started(ProgramConfig::default());
    let root = program.root().expect("mounted");
    let button = program.surface().children(root)[0];

    program.dispatch(button, &Event::new("click")).expect("dispatch");
    program.dispatch(button, &Event::new("click")).expect("dispatch");
    assert_eq!(program.queue().len(), 2);
    assert_eq!(program.model().count, 0);

    program.step().expect("step");
    assert_eq!(program.model().count, 2);
    assert_eq!(markup(&program), "<div><button @click></button><span>2</span></div>");
}

#[test]
fn batch_commands_queue_in_order() {
    struct Log(Vec<i32>);

    impl Model for Log {
        type Message = i32;

        fn init(&mut self) -> Cmd<i32> {
            Cmd::batch(vec![Cmd::msg(1), Cmd::batch(vec![Cmd::msg(2), Cmd::msg(3)])])
        }

        fn update(&mut self, msg: i32) -> Cmd<i32> {
            self.0.push(msg);
            if msg == 1 { Cmd::msg(4) } else { Cmd::none() }
        }

        fn view(&self) -> VNode<i32> {
            VNode::text(self.0.len().to_string())
        }
    }

    let mut program = Program::new(Log(Vec::new()), HeadlessDom::<i32>::new());
    program.init().expect("init");
    let r = program.step().expect("step");
    assert_eq!(r.messages_processed, 4);
    assert_eq!(program.model().0, vec![1, 2, 3, 4]);
    assert_eq!(program.surface().to_markup(program.root().expect("root")), "4");
}
