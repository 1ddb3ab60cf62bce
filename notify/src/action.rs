use std::{any::Any, fmt};

/// Caller supplied context with an optional destructor.
///
/// The destructor receives the value back and runs exactly once, when the
/// `UserData` is dropped or replaced.
pub struct UserData {
    data: Option<Box<dyn Any>>,
    destroy: Option<Box<dyn FnOnce(Box<dyn Any>)>>,
}

impl UserData {
    pub fn new<T>(data: T) -> Self
    where
        T: Any,
    {
        Self {
            data: Some(Box::new(data)),
            destroy: None,
        }
    }

    pub fn with_destructor<T, F>(data: T, destroy: F) -> Self
    where
        T: Any,
        F: FnOnce(T) + 'static,
    {
        Self {
            data: Some(Box::new(data)),
            destroy: Some(Box::new(move |data: Box<dyn Any>| {
                if let Ok(data) = data.downcast::<T>() {
                    destroy(*data);
                }
            })),
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.data.as_ref()?.downcast_ref()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.data.as_mut()?.downcast_mut()
    }
}

impl Drop for UserData {
    fn drop(&mut self) {
        if let (Some(data), Some(destroy)) = (self.data.take(), self.destroy.take()) {
            destroy(data);
        }
    }
}

impl fmt::Debug for UserData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserData")
            .field("destructor", &self.destroy.is_some())
            .finish_non_exhaustive()
    }
}

/// Receives the notification id, the action key and the action's user data.
pub type ActionCallback = Box<dyn FnMut(u32, &str, Option<&mut UserData>)>;

pub struct Action {
    id: Box<str>,
    label: Box<str>,
    pub(crate) callback: Option<ActionCallback>,
    pub(crate) user_data: Option<UserData>,
}

impl Action {
    pub fn new<F>(id: &str, label: &str, callback: F, user_data: Option<UserData>) -> Self
    where
        F: FnMut(u32, &str, Option<&mut UserData>) + 'static,
    {
        Self {
            id: id.into(),
            label: label.into(),
            callback: Some(Box::new(callback)),
            user_data,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("user_data", &self.user_data)
            .finish()
    }
}

/// Flattens actions into the alternating `[id, label, ...]` list of `Notify`.
pub fn flatten(actions: &[Action]) -> Vec<String> {
    actions
        .iter()
        .flat_map(|action| [action.id.to_string(), action.label.to_string()])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::Cell, rc::Rc};

    #[test]
    fn destructor_runs_once_on_drop() {
        let dropped = Rc::new(Cell::new(0));
        let counter = Rc::clone(&dropped);
        let data = UserData::with_destructor(String::from("ctx"), move |s| {
            assert_eq!(s, "ctx");
            counter.set(counter.get() + 1);
        });

        assert_eq!(data.downcast_ref::<String>().map(String::as_str), Some("ctx"));
        drop(data);
        assert_eq!(dropped.get(), 1);
    }

    #[test]
    fn no_destructor_is_fine() {
        let mut data = UserData::new(5u32);
        *data.downcast_mut::<u32>().unwrap() += 1;

        assert_eq!(data.downcast_ref::<u32>(), Some(&6));
        assert!(data.downcast_ref::<i64>().is_none());
    }

    #[test]
    fn flatten_alternates_id_and_label() {
        let actions = [
            Action::new("default", "Open", |_, _, _| {}, None),
            Action::new("2", "Dismiss", |_, _, _| {}, None),
        ];

        assert_eq!(flatten(&actions), ["default", "Open", "2", "Dismiss"]);
    }

    #[test]
    fn action_user_data_released_with_action() {
        let dropped = Rc::new(Cell::new(false));
        let flag = Rc::clone(&dropped);
        let action = Action::new(
            "1",
            "Open",
            |_, _, _| {},
            Some(UserData::with_destructor((), move |_| flag.set(true))),
        );

        drop(action);
        assert!(dropped.get());
    }
}
