use crate::geometry::pose::Pose;
use crate::math::DualQuat;
use nalgebra::{Matrix4, UnitQuaternion, Vector3};
use std::cell::Cell;
use std::fmt;

/// 变换树中的节点句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransformId(usize);

impl TransformId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// 带版本号的缓存值，版本与所属变换不一致即视为失效
#[derive(Debug, Clone, Copy)]
struct Versioned<T: Copy> {
    version: u64,
    value: T,
}

/// 单个变换：局部/世界两套姿态 + 惰性派生缓存
///
/// 每次修改都会递增 `version`，缓存在读取时对比版本号决定是否重算。
/// 层级关系由 [`TransformTree`] 维护；独立使用时（例如相机）局部即世界。
#[derive(Debug, Clone)]
pub struct Transform {
    pub name: String,
    local: Pose,
    world: Pose,
    version: u64,
    trs_cache: Cell<Option<Versioned<Matrix4<f32>>>>,
    dq_cache: Cell<Option<Versioned<(DualQuat, Vector3<f32>)>>>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::new("Transform")
    }
}

impl Transform {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_pose(name, Pose::identity())
    }

    pub fn with_pose(name: impl Into<String>, pose: Pose) -> Self {
        Self {
            name: name.into(),
            local: pose,
            world: pose,
            version: 0,
            trs_cache: Cell::new(None),
            dq_cache: Cell::new(None),
        }
    }

    // ===== 读取 =====

    pub fn local_pose(&self) -> &Pose {
        &self.local
    }

    pub fn world_pose(&self) -> &Pose {
        &self.world
    }

    pub fn position(&self) -> Vector3<f32> {
        self.world.position
    }

    pub fn rotation(&self) -> UnitQuaternion<f32> {
        self.world.rotation
    }

    pub fn scale(&self) -> Vector3<f32> {
        self.world.scale
    }

    pub fn local_position(&self) -> Vector3<f32> {
        self.local.position
    }

    pub fn local_rotation(&self) -> UnitQuaternion<f32> {
        self.local.rotation
    }

    pub fn local_scale(&self) -> Vector3<f32> {
        self.local.scale
    }

    /// 修改计数，每次姿态变化加一
    pub fn version(&self) -> u64 {
        self.version
    }

    /// 世界 TRS 矩阵（缓存）
    pub fn trs(&self) -> Matrix4<f32> {
        if let Some(cached) = self.trs_cache.get() {
            if cached.version == self.version {
                return cached.value;
            }
        }
        let value = self.world.to_matrix();
        self.trs_cache.set(Some(Versioned {
            version: self.version,
            value,
        }));
        value
    }

    /// 世界 TRS 的逆矩阵，不经过通用求逆
    pub fn inv_trs(&self) -> Matrix4<f32> {
        self.world.to_inverse_matrix()
    }

    /// 世界变换的对偶四元数（缓存），缩放单独返回
    pub fn to_dual_quaternion(&self) -> (DualQuat, Vector3<f32>) {
        if let Some(cached) = self.dq_cache.get() {
            if cached.version == self.version {
                return cached.value;
            }
        }
        let value = (self.world.to_dual_quaternion(), self.world.scale);
        self.dq_cache.set(Some(Versioned {
            version: self.version,
            value,
        }));
        value
    }

    /// 独立变换（无父节点）直接设置姿态
    pub fn set_pose(&mut self, pose: Pose) {
        self.assign(pose, pose);
    }

    pub fn set_position(&mut self, position: Vector3<f32>) {
        let pose = Pose {
            position,
            ..self.world
        };
        self.set_pose(pose);
    }

    pub fn set_rotation(&mut self, rotation: UnitQuaternion<f32>) {
        let pose = Pose {
            rotation,
            ..self.world
        };
        self.set_pose(pose);
    }

    fn assign(&mut self, local: Pose, world: Pose) {
        self.local = local;
        self.world = world;
        self.version = self.version.wrapping_add(1);
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        writeln!(f, "  local: {}", self.local)?;
        write!(f, "  world: {}", self.world)
    }
}

#[derive(Debug, Clone)]
struct TransformNode {
    transform: Transform,
    parent: Option<TransformId>,
    children: Vec<TransformId>,
}

/// 变换层级：节点存放在连续数组中，父子关系用句柄表示
///
/// 不变式：任意修改后 `world = compose(parent.world, local)` 对每个节点成立，
/// 且层级中不存在环。
#[derive(Debug, Clone, Default)]
pub struct TransformTree {
    nodes: Vec<TransformNode>,
}

impl TransformTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建一个位于原点的根节点
    pub fn create(&mut self, name: impl Into<String>) -> TransformId {
        self.create_with_pose(name, Pose::identity())
    }

    /// 创建根节点，`pose` 同时作为局部与世界姿态
    pub fn create_with_pose(&mut self, name: impl Into<String>, pose: Pose) -> TransformId {
        let id = TransformId(self.nodes.len());
        self.nodes.push(TransformNode {
            transform: Transform::with_pose(name, pose),
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: TransformId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn get(&self, id: TransformId) -> &Transform {
        &self.nodes[id.0].transform
    }

    pub fn find(&self, name: &str) -> Option<TransformId> {
        self.nodes
            .iter()
            .position(|n| n.transform.name == name)
            .map(TransformId)
    }

    pub fn rename(&mut self, id: TransformId, name: impl Into<String>) {
        self.nodes[id.0].transform.name = name.into();
    }

    // ===== 层级 =====

    pub fn parent(&self, id: TransformId) -> Option<TransformId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: TransformId) -> &[TransformId] {
        &self.nodes[id.0].children
    }

    pub fn child(&self, id: TransformId, index: usize) -> Option<TransformId> {
        self.nodes[id.0].children.get(index).copied()
    }

    pub fn child_count(&self, id: TransformId) -> usize {
        self.nodes[id.0].children.len()
    }

    /// `ancestor` 是否为 `id` 的祖先（不含自身）
    pub fn is_ancestor(&self, ancestor: TransformId, id: TransformId) -> bool {
        let mut current = self.nodes[id.0].parent;
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.nodes[p.0].parent;
        }
        false
    }

    /// 重新挂接父节点，保持世界姿态不变、重算局部姿态
    ///
    /// 把节点挂到自身或其后代下会形成环，返回错误且不做任何修改。
    pub fn set_parent(
        &mut self,
        id: TransformId,
        new_parent: Option<TransformId>,
    ) -> Result<(), String> {
        if let Some(p) = new_parent {
            if p == id || self.is_ancestor(id, p) {
                return Err(format!(
                    "不能把 '{}' 挂到 '{}' 下：层级中会出现环",
                    self.get(id).name,
                    self.get(p).name
                ));
            }
        }
        if self.nodes[id.0].parent == new_parent {
            return Ok(());
        }

        if let Some(old) = self.nodes[id.0].parent.take() {
            self.nodes[old.0].children.retain(|c| *c != id);
        }
        if let Some(p) = new_parent {
            self.nodes[p.0].children.push(id);
        }
        self.nodes[id.0].parent = new_parent;

        let world = self.nodes[id.0].transform.world;
        let local = self.local_from_world(id, &world);
        self.nodes[id.0].transform.assign(local, world);
        Ok(())
    }

    pub fn add_child(&mut self, parent: TransformId, child: TransformId) -> Result<(), String> {
        self.set_parent(child, Some(parent))
    }

    /// 断开父子关系；`child` 不是 `parent` 的子节点时不做任何事
    pub fn remove_child(&mut self, parent: TransformId, child: TransformId) -> Result<(), String> {
        if self.nodes[child.0].parent == Some(parent) {
            self.set_parent(child, None)
        } else {
            Ok(())
        }
    }

    // ===== 局部姿态 =====

    pub fn set_local_transform(
        &mut self,
        id: TransformId,
        scale: Vector3<f32>,
        rotation: UnitQuaternion<f32>,
        position: Vector3<f32>,
    ) {
        self.set_local_pose(id, Pose::new(scale, rotation, position));
    }

    /// 设置局部姿态，重算自身世界姿态并向下传播
    pub fn set_local_pose(&mut self, id: TransformId, local: Pose) {
        let world = self.world_from_local(id, &local);
        self.nodes[id.0].transform.assign(local, world);
        self.propagate(id);
    }

    pub fn set_local_matrix(&mut self, id: TransformId, m: &Matrix4<f32>) -> Result<(), String> {
        self.set_local_pose(id, Pose::from_matrix(m)?);
        Ok(())
    }

    pub fn set_local_position(&mut self, id: TransformId, position: Vector3<f32>) {
        let local = Pose {
            position,
            ..self.nodes[id.0].transform.local
        };
        self.set_local_pose(id, local);
    }

    pub fn set_local_rotation(&mut self, id: TransformId, rotation: UnitQuaternion<f32>) {
        let local = Pose {
            rotation,
            ..self.nodes[id.0].transform.local
        };
        self.set_local_pose(id, local);
    }

    pub fn set_local_scale(&mut self, id: TransformId, scale: Vector3<f32>) {
        let local = Pose {
            scale,
            ..self.nodes[id.0].transform.local
        };
        self.set_local_pose(id, local);
    }

    // ===== 世界姿态 =====

    pub fn set_world_transform(
        &mut self,
        id: TransformId,
        scale: Vector3<f32>,
        rotation: UnitQuaternion<f32>,
        position: Vector3<f32>,
    ) {
        self.set_world_pose(id, Pose::new(scale, rotation, position));
    }

    /// 设置世界姿态，反算局部姿态，子节点世界姿态随之更新
    pub fn set_world_pose(&mut self, id: TransformId, world: Pose) {
        let local = self.local_from_world(id, &world);
        self.nodes[id.0].transform.assign(local, world);
        self.propagate(id);
    }

    pub fn set_world_matrix(&mut self, id: TransformId, m: &Matrix4<f32>) -> Result<(), String> {
        self.set_world_pose(id, Pose::from_matrix(m)?);
        Ok(())
    }

    pub fn set_position(&mut self, id: TransformId, position: Vector3<f32>) {
        let world = Pose {
            position,
            ..self.nodes[id.0].transform.world
        };
        self.set_world_pose(id, world);
    }

    pub fn set_rotation(&mut self, id: TransformId, rotation: UnitQuaternion<f32>) {
        let world = Pose {
            rotation,
            ..self.nodes[id.0].transform.world
        };
        self.set_world_pose(id, world);
    }

    pub fn set_scale(&mut self, id: TransformId, scale: Vector3<f32>) {
        let world = Pose {
            scale,
            ..self.nodes[id.0].transform.world
        };
        self.set_world_pose(id, world);
    }

    /// `out` 的世界姿态 = 先应用 `first`，再依次应用 `rest`
    pub fn mul_transform(&mut self, first: TransformId, rest: &[TransformId], out: TransformId) {
        let combined = rest.iter().fold(self.get(first).world, |acc, id| {
            acc.then(&self.nodes[id.0].transform.world)
        });
        self.set_world_pose(out, combined);
    }

    /// `out` 的世界姿态 = `source` 世界姿态的逆，不复制层级信息
    pub fn inverse(&mut self, source: TransformId, out: TransformId) {
        let inverse = self.get(source).world.inverse();
        self.set_world_pose(out, inverse);
    }

    pub fn trs(&self, id: TransformId) -> Matrix4<f32> {
        self.get(id).trs()
    }

    /// 以缩进文本打印以 `id` 为根的子树
    pub fn hierarchy(&self, id: TransformId) -> String {
        let mut out = String::new();
        let mut stack = vec![(id, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            out.push_str(&"  ".repeat(depth));
            out.push_str(&self.nodes[node.0].transform.name);
            out.push('\n');
            for child in self.nodes[node.0].children.iter().rev() {
                stack.push((*child, depth + 1));
            }
        }
        out
    }

    fn world_from_local(&self, id: TransformId, local: &Pose) -> Pose {
        match self.nodes[id.0].parent {
            Some(p) => Pose::compose(&self.nodes[p.0].transform.world, local),
            None => *local,
        }
    }

    fn local_from_world(&self, id: TransformId, world: &Pose) -> Pose {
        match self.nodes[id.0].parent {
            Some(p) => Pose::relative_to(world, &self.nodes[p.0].transform.world),
            None => *world,
        }
    }

    /// 深度优先地自上而下重算后代的世界姿态
    fn propagate(&mut self, id: TransformId) {
        let mut stack: Vec<TransformId> = self.nodes[id.0].children.clone();
        while let Some(node) = stack.pop() {
            let local = self.nodes[node.0].transform.local;
            let world = self.world_from_local(node, &local);
            self.nodes[node.0].transform.assign(local, world);
            stack.extend_from_slice(&self.nodes[node.0].children);
        }
    }
}
