use std::rc::Rc;

use stateman_bind::*;
use stateman_core::*;

struct TodoList {
    model: Model,
}

impl TodoList {
    fn new() -> Self {
        Self {
            model: Model::new(object! {
                "title" => "Groceries",
                "items" => array![],
                "sync" => AsyncResult::<i64>::idle(),
            }),
        }
    }

    fn add(&self, item: &str) -> Result<(), StateError> {
        self.items()?.push(item)
    }

    fn remove_last(&self) -> Result<Option<Value>, StateError> {
        self.items()?.pop()
    }

    fn sync(&self) -> Result<(), StateError> {
        let state = self.model.state();
        state.set_async("sync", AsyncResult::<i64>::pending())?;
        let count = self.items()?.len() as i64;
        state.set_async("sync", AsyncResult::<i64>::success(count))
    }

    fn items(&self) -> Result<Observed, StateError> {
        self.model
            .state()
            .child("items")
            .ok_or(StateError::NotANode {
                key: "items".into(),
            })
    }
}

impl Controller for TodoList {
    fn model(&self) -> &Model {
        &self.model
    }
}

fn app(list: &Rc<TodoList>) -> String {
    let list = use_controller(list);
    let state = list.model().state();
    let title = state
        .get("title")
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default();
    let items = state.child("items").map(|v| v.len()).unwrap_or(0);
    let sync = state
        .child("sync")
        .and_then(|v| AsyncResult::<Value, String>::from_observed(&v))
        .map(|r| r.status)
        .unwrap_or_default();
    format!("{title}: {items} item(s), sync {sync}")
}

fn flush(component: &Component, queue: &RenderQueue, list: &Rc<TodoList>) {
    let requested = queue.take();
    if requested > 0 {
        // coalesce: one pass covers every request since the last frame
        let frame = component.render(|| app(list));
        log::info!("render #{} ({requested} request(s)): {frame}", component.render_count());
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let queue = RenderQueue::new();
    let component = Component::new(queue.clone());
    let list = Rc::new(TodoList::new());

    let frame = component.render(|| app(&list));
    log::info!("render #1: {frame}");

    list.add("milk")?;
    list.add("eggs")?;
    flush(&component, &queue, &list);

    list.model().state().set("title", "Groceries")?; // unchanged, no render
    flush(&component, &queue, &list);

    list.sync()?;
    flush(&component, &queue, &list);

    list.remove_last()?;
    flush(&component, &queue, &list);

    component.unmount();
    list.add("bread")?;
    anyhow::ensure!(queue.pending() == 0, "unmounted component was asked to render");
    log::info!("listeners after unmount: {}", list.model().listener_count());
    Ok(())
}
