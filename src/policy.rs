use anyhow::Result;

pub trait Policy<S: ?Sized, A> {
    // 根据状态选择动作（确定性，无噪声）
    fn select_action(&self, state: &S) -> Result<A>;
}
